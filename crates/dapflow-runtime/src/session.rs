//! Session lifecycle: launch, restart and quit.

use crate::breakpoints::BreakpointManager;
use crate::config::TimingConfig;
use crate::context::{DebugContext, SessionSignal};
use crate::host::DebugHost;
use crate::launch::{self, PreparedLaunch};
use crate::navigation::{LaunchOutcome, NavigationExecutor};
use crate::{Error, Result};
use dapflow_core::{PollPolicy, paths_equal, poll_until};
use dapflow_types::{
    Breakpoint, LaunchConfiguration, LaunchParams, Location, NavigationResult, StackFrame,
};
use std::sync::Arc;

pub struct SessionManager {
    host: Arc<dyn DebugHost>,
    ctx: Arc<DebugContext>,
    breakpoints: Arc<BreakpointManager>,
    navigator: Arc<NavigationExecutor>,
    timing: TimingConfig,
    registry: Vec<LaunchConfiguration>,
}

impl SessionManager {
    pub fn new(
        host: Arc<dyn DebugHost>,
        ctx: Arc<DebugContext>,
        breakpoints: Arc<BreakpointManager>,
        navigator: Arc<NavigationExecutor>,
        timing: TimingConfig,
        registry: Vec<LaunchConfiguration>,
    ) -> Self {
        Self {
            host,
            ctx,
            breakpoints,
            navigator,
            timing,
            registry,
        }
    }

    pub fn registry(&self) -> &[LaunchConfiguration] {
        &self.registry
    }

    /// Start a session and run it to its first stop.
    ///
    /// Any active session is quit first. The caller parameters are kept for
    /// `restart` once a session has actually started.
    pub async fn launch(&self, params: LaunchParams) -> Result<NavigationResult> {
        if let Some(active) = self.ctx.active_session() {
            tracing::info!(session = %active.id, "quitting active session before launch");
            if let Err(err) = self.quit().await {
                tracing::warn!(session = %active.id, error = %err, "failed to quit previous session");
            }
        }

        let PreparedLaunch {
            configuration,
            entry,
        } = launch::prepare(&params, &self.registry)?;

        // A breakpoint the user already placed on the entry line is left alone
        let entry = match entry {
            Some(location) if self.breakpoints.get(&location).is_none() => {
                self.breakpoints.set(Breakpoint::new(location.clone())).await?;
                Some(location)
            }
            _ => None,
        };

        let outcome = self.start(&configuration).await;
        let started = matches!(outcome, LaunchOutcome::Started(_));
        let result = self.navigator.launch(outcome).await;

        // Removed once hit, or when the session never paused
        if let Some(entry) = &entry
            && (!result.success || result.frame.as_ref().is_some_and(|f| at_location(f, entry)))
            && let Err(err) = self.breakpoints.remove_by_location(entry).await
        {
            tracing::warn!(error = %err, "failed to remove entry breakpoint");
        }

        if started {
            self.ctx.store_launch_snapshot(params);
        }
        Ok(result)
    }

    /// Launch again with the parameters of the last started session
    pub async fn restart(&self) -> Result<NavigationResult> {
        let params = self.ctx.launch_snapshot().ok_or(Error::NoLaunchSnapshot)?;
        tracing::info!(program = ?params.program, config = ?params.config_name, "restarting");
        self.launch(params).await
    }

    /// Stop the active session and wait for its termination notification.
    ///
    /// A no-op without an active session. The active pointer and last stop
    /// are cleared before the stop request so nothing observes a dying
    /// session as current.
    pub async fn quit(&self) -> Result<()> {
        let Some(session) = self.ctx.take_active() else {
            return Ok(());
        };
        self.ctx.clear_last_stop(&session.id);
        let signal = self.ctx.subscribe(&session.id);

        self.host.stop_debugging(&session).await?;

        let Some(mut rx) = signal else {
            return Ok(());
        };
        let timeout = self.timing.quit_timeout();
        let terminated = tokio::time::timeout(
            timeout,
            rx.wait_for(|signal| matches!(signal, SessionSignal::Terminated)),
        )
        .await
        .is_ok();

        // A closed slot means the id was already re-anchored; also terminal
        if terminated {
            tracing::info!(session = %session.id, "session quit");
        } else {
            tracing::warn!(
                session = %session.id,
                timeout_ms = timeout.as_millis() as u64,
                "no termination notification after stop request"
            );
        }
        Ok(())
    }

    async fn start(&self, configuration: &LaunchConfiguration) -> LaunchOutcome {
        let before = self.ctx.session_generation();

        match self.host.start_debugging(configuration).await {
            Ok(true) => {}
            Ok(false) => {
                return LaunchOutcome::Failed(format!(
                    "Host refused to start debugging '{}'",
                    configuration.name
                ));
            }
            Err(err) => {
                return LaunchOutcome::Failed(format!(
                    "Failed to start debugging '{}': {}",
                    configuration.name, err
                ));
            }
        }

        let timeout = self.timing.session_start_timeout();
        let policy = PollPolicy::new(self.timing.poll_policy().interval, timeout);
        let ctx = &self.ctx;
        let session = poll_until(policy, move || async move {
            if ctx.session_generation() > before {
                ctx.latest_session()
            } else {
                None
            }
        })
        .await;

        match session {
            Some(session) => {
                tracing::info!(session = %session.id, name = %configuration.name, "launch acknowledged");
                LaunchOutcome::Started(session)
            }
            None => LaunchOutcome::Failed(Error::SessionStartTimeout(timeout).to_string()),
        }
    }
}

fn at_location(frame: &StackFrame, location: &Location) -> bool {
    frame.line == location.line
        && frame
            .source_path
            .as_deref()
            .is_some_and(|path| paths_equal(path, &location.path))
}
