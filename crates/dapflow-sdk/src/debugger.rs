use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dapflow_runtime::{
    BreakpointManager, BreakpointOutcome, BufferedTerminalCapture, DebugConfig, DebugContext,
    DebugHost, Navigation, NavigationExecutor, OutputCaptureStore, ProtocolClient,
    QuiescencePolicy, RawOutputCapturer, SessionManager, StopEventTracker,
};
use dapflow_types::{
    Breakpoint, BreakpointListResult, BreakpointRemovalResult, BreakpointResult, LaunchParams,
    Location, NavigationResult, OperationResult, Session, SessionId, StackTraceResult,
};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::events::EventStream;

pub struct DebuggerBuilder {
    host: Option<Arc<dyn DebugHost>>,
    config: DebugConfig,
    raw_output: Option<Arc<dyn RawOutputCapturer>>,
}

impl DebuggerBuilder {
    fn new() -> Self {
        Self {
            host: None,
            config: DebugConfig::default(),
            raw_output: None,
        }
    }

    pub fn host(mut self, host: Arc<dyn DebugHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn config(mut self, config: DebugConfig) -> Self {
        self.config = config;
        self
    }

    /// Raw terminal output source; defaults to a [`BufferedTerminalCapture`]
    pub fn raw_output(mut self, capturer: Arc<dyn RawOutputCapturer>) -> Self {
        self.raw_output = Some(capturer);
        self
    }

    /// Wire the components together and start the host event pump.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Debugger> {
        let host = self
            .host
            .ok_or_else(|| Error::InvalidInput("a debug host is required".to_string()))?;
        let events = host.take_event_receiver().ok_or_else(|| {
            Error::InvalidInput("host event receiver was already taken".to_string())
        })?;

        let timing = self.config.timing.clone();
        let policy = QuiescencePolicy::from(&self.config.output);
        let raw = self
            .raw_output
            .unwrap_or_else(|| Arc::new(BufferedTerminalCapture::new(policy)));

        let ctx = Arc::new(DebugContext::new());
        let output = Arc::new(OutputCaptureStore::new(raw, policy));
        let protocol = ProtocolClient::new(host.clone(), timing.request_timeout());
        let breakpoints = Arc::new(BreakpointManager::new(
            host.clone(),
            ctx.clone(),
            timing.clone(),
        ));
        let navigator = Arc::new(NavigationExecutor::new(
            ctx.clone(),
            protocol.clone(),
            breakpoints.clone(),
            output.clone(),
            timing.clone(),
        ));
        let sessions = SessionManager::new(
            host.clone(),
            ctx.clone(),
            breakpoints.clone(),
            navigator.clone(),
            timing,
            self.config.configurations,
        );

        let tracker = Arc::new(StopEventTracker::new(
            host,
            ctx.clone(),
            output,
            protocol,
            breakpoints.clone(),
        ));
        let pump = tracker.spawn(events);

        tracing::debug!(configurations = sessions.registry().len(), "debugger ready");
        Ok(Debugger {
            ctx,
            breakpoints,
            navigator,
            sessions,
            pump,
        })
    }
}

/// Facade over one host: launch, navigate, manage breakpoints.
///
/// Every operation reports its outcome through a result object; failures
/// such as a vanished session or an adapter rejection come back as
/// `success: false` with an error message.
pub struct Debugger {
    ctx: Arc<DebugContext>,
    breakpoints: Arc<BreakpointManager>,
    navigator: Arc<NavigationExecutor>,
    sessions: SessionManager,
    pump: JoinHandle<()>,
}

impl Drop for Debugger {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl Debugger {
    pub fn builder() -> DebuggerBuilder {
        DebuggerBuilder::new()
    }

    pub fn new(host: Arc<dyn DebugHost>, config: DebugConfig) -> Result<Self> {
        Self::builder().host(host).config(config).build()
    }

    // --- session lifecycle ---

    /// Launch a program (or a named configuration) and run to the first stop
    pub async fn launch(&self, params: LaunchParams) -> NavigationResult {
        self.sessions
            .launch(params)
            .await
            .unwrap_or_else(|err| navigation_failure("launch", err))
    }

    /// Launch again with the parameters of the last launch
    pub async fn restart(&self) -> NavigationResult {
        self.sessions
            .restart()
            .await
            .unwrap_or_else(|err| navigation_failure("restart", err))
    }

    pub async fn quit(&self) -> OperationResult {
        operation(self.sessions.quit().await)
    }

    pub fn active_session(&self) -> Option<Session> {
        self.ctx.active_session()
    }

    pub fn events(&self) -> EventStream {
        EventStream::new(self.ctx.subscribe_events())
    }

    // --- navigation ---

    pub async fn continue_execution(&self) -> NavigationResult {
        self.run(None, Navigation::Continue).await
    }

    pub async fn next(&self) -> NavigationResult {
        self.run(None, Navigation::Next).await
    }

    pub async fn step_in(&self) -> NavigationResult {
        self.run(None, Navigation::StepIn).await
    }

    pub async fn step_out(&self) -> NavigationResult {
        self.run(None, Navigation::StepOut).await
    }

    /// Move execution to a one-based line of the current file without running
    /// the code in between
    pub async fn jump(&self, line: u32) -> NavigationResult {
        self.run(None, Navigation::Jump(line)).await
    }

    /// Run until a one-based line of the current file is reached
    pub async fn until(&self, line: u32) -> NavigationResult {
        self.run(None, Navigation::Until(line)).await
    }

    /// Navigate a specific session; fails unless it is the active one
    pub async fn navigate(&self, session_id: &SessionId, navigation: Navigation) -> NavigationResult {
        self.run(Some(session_id), navigation).await
    }

    async fn run(&self, session_id: Option<&SessionId>, navigation: Navigation) -> NavigationResult {
        self.navigator
            .navigate(session_id, navigation)
            .await
            .unwrap_or_else(|err| navigation_failure(navigation.name(), err))
    }

    pub async fn stack_trace(&self) -> StackTraceResult {
        match self.navigator.stack_trace(None).await {
            Ok(frames) => StackTraceResult {
                success: true,
                frames,
                error_message: None,
            },
            Err(err) => StackTraceResult {
                success: false,
                frames: Vec::new(),
                error_message: Some(err.to_string()),
            },
        }
    }

    // --- breakpoints ---

    pub async fn set_breakpoint(&self, breakpoint: Breakpoint) -> BreakpointResult {
        breakpoint_result(self.breakpoints.set(breakpoint).await)
    }

    /// One-shot breakpoint, removed once execution stops on it
    pub async fn set_temp_breakpoint(&self, location: Location) -> BreakpointResult {
        breakpoint_result(self.breakpoints.set_temporary(location).await)
    }

    pub async fn remove_breakpoint_by_location(&self, location: &Location) -> OperationResult {
        operation(self.breakpoints.remove_by_location(location).await.map(|_| ()))
    }

    pub async fn remove_all_breakpoints_in_file(&self, path: &Path) -> BreakpointRemovalResult {
        match self.breakpoints.remove_all_in_file(path).await {
            Ok(removed) => BreakpointRemovalResult {
                success: true,
                removed,
                error_message: None,
            },
            Err(err) => BreakpointRemovalResult {
                success: false,
                removed: 0,
                error_message: Some(err.to_string()),
            },
        }
    }

    pub async fn enable_breakpoint(&self, location: &Location) -> BreakpointResult {
        breakpoint_result(self.breakpoints.enable(location).await)
    }

    pub async fn disable_breakpoint(&self, location: &Location) -> BreakpointResult {
        breakpoint_result(self.breakpoints.disable(location).await)
    }

    /// Skip the next `count` hits of the breakpoint at `location`
    pub async fn ignore_breakpoint(&self, location: &Location, count: u32) -> BreakpointResult {
        breakpoint_result(self.breakpoints.set_ignore_count(location, count).await)
    }

    /// Set or clear (`None`) the condition of the breakpoint at `location`
    pub async fn set_breakpoint_condition(
        &self,
        location: &Location,
        condition: Option<String>,
    ) -> BreakpointResult {
        breakpoint_result(self.breakpoints.set_condition(location, condition).await)
    }

    /// Current breakpoints, optionally waiting up to `timeout` for `wait_for`
    /// to show up
    pub async fn get_active_breakpoints(
        &self,
        wait_for: Option<&Location>,
        timeout: Option<Duration>,
    ) -> BreakpointListResult {
        BreakpointListResult {
            success: true,
            breakpoints: self.breakpoints.active(wait_for, timeout).await,
            error_message: None,
        }
    }
}

fn navigation_failure(operation: &str, err: dapflow_runtime::Error) -> NavigationResult {
    tracing::warn!(operation, error = %err, "operation failed");
    NavigationResult::failure(err.to_string())
}

fn operation(result: dapflow_runtime::Result<()>) -> OperationResult {
    match result {
        Ok(()) => OperationResult::ok(),
        Err(err) => OperationResult::failure(err.to_string()),
    }
}

fn breakpoint_result(result: dapflow_runtime::Result<BreakpointOutcome>) -> BreakpointResult {
    match result {
        Ok(outcome) => BreakpointResult {
            success: true,
            breakpoint: Some(outcome.breakpoint),
            verified: outcome.verified,
            error_message: None,
        },
        Err(err) => BreakpointResult::failure(err.to_string()),
    }
}
