//! Execute-and-reconcile pipeline behind launch and every navigation command.
//!
//! Each call subscribes to the session's stop slot before resuming, waits for
//! the next stop (or termination), reconciles against the last known stop and
//! then polls the call stack until the adapter reports the new position.

use crate::breakpoints::BreakpointManager;
use crate::config::TimingConfig;
use crate::context::{DebugContext, SessionSignal, WaitOutcome, wait_for_signal};
use crate::output::OutputCaptureStore;
use crate::protocol::{ProtocolClient, ResumeRequest, StepCommand};
use crate::{Error, Result};
use dapflow_core::{PollPolicy, poll_until};
use dapflow_types::{
    ExceptionCapture, ExceptionInfo, Location, NavigationResult, Session, SessionId, StackFrame,
    StopEvent, StopReason,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Navigation commands accepted by [`NavigationExecutor::navigate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Continue,
    Next,
    StepIn,
    StepOut,
    /// Move the instruction pointer to a one-based line of the current file
    Jump(u32),
    /// Run until a one-based line of the current file is reached
    Until(u32),
}

impl Navigation {
    pub fn name(&self) -> &'static str {
        match self {
            Navigation::Continue => "continue",
            Navigation::Next => "next",
            Navigation::StepIn => "stepIn",
            Navigation::StepOut => "stepOut",
            Navigation::Jump(_) => "jump",
            Navigation::Until(_) => "until",
        }
    }
}

/// What the session manager observed when starting a session
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchOutcome {
    Started(Session),
    Failed(String),
}

enum FramePoll {
    Moved(StackFrame),
    Terminated,
}

pub struct NavigationExecutor {
    ctx: Arc<DebugContext>,
    protocol: ProtocolClient,
    breakpoints: Arc<BreakpointManager>,
    output: Arc<OutputCaptureStore>,
    timing: TimingConfig,
}

impl NavigationExecutor {
    pub fn new(
        ctx: Arc<DebugContext>,
        protocol: ProtocolClient,
        breakpoints: Arc<BreakpointManager>,
        output: Arc<OutputCaptureStore>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            ctx,
            protocol,
            breakpoints,
            output,
            timing,
        }
    }

    /// Run one navigation command on the active session.
    ///
    /// Fails fast with `NoActiveSession`/`InactiveSession` when `session_id`
    /// is not the tracked session, and with `NavigationInProgress` when
    /// another command on the same session has not finished.
    pub async fn navigate(
        &self,
        session_id: Option<&SessionId>,
        navigation: Navigation,
    ) -> Result<NavigationResult> {
        let session = self.ctx.require_active(session_id)?;
        let lock = self
            .ctx
            .navigation_lock(&session.id)
            .ok_or_else(|| Error::InactiveSession(session.id.clone()))?;
        let _guard = lock
            .try_lock_owned()
            .map_err(|_| Error::NavigationInProgress(session.id.clone()))?;

        tracing::debug!(session = %session.id, command = navigation.name(), "navigating");

        let thread_id = self.resolve_thread(&session).await?;
        let initial = match self.protocol.top_frame(&session, thread_id).await {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(session = %session.id, error = %err, "no initial frame");
                None
            }
        };

        let request = match navigation {
            Navigation::Continue => ResumeRequest::step(StepCommand::Continue, thread_id),
            Navigation::Next => ResumeRequest::step(StepCommand::Next, thread_id),
            Navigation::StepIn => ResumeRequest::step(StepCommand::StepIn, thread_id),
            Navigation::StepOut => ResumeRequest::step(StepCommand::StepOut, thread_id),
            Navigation::Jump(line) => {
                let path = current_source(initial.as_ref())?;
                let target = self
                    .protocol
                    .goto_targets(&session, &path, line)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(Error::JumpTargetUnavailable { path, line })?;
                ResumeRequest::goto(thread_id, target.id)
            }
            Navigation::Until(line) => {
                let location = Location::new(current_source(initial.as_ref())?, line);
                // An existing breakpoint already stops there and must outlive the run
                if self.breakpoints.get(&location).is_some() {
                    tracing::debug!(session = %session.id, line, "until target already has a breakpoint");
                } else {
                    self.breakpoints.set_temporary(location).await?;
                }
                ResumeRequest::step(StepCommand::Continue, thread_id)
            }
        };

        Ok(self.resume(&session, &request, initial.as_ref()).await)
    }

    /// Feed a launch outcome through the pipeline.
    ///
    /// The first stop may already be in the slot by the time this runs, so
    /// the current value counts.
    pub async fn launch(&self, outcome: LaunchOutcome) -> NavigationResult {
        let session = match outcome {
            LaunchOutcome::Started(session) => session,
            LaunchOutcome::Failed(message) => {
                tokio::time::sleep(self.timing.failure_grace()).await;
                return NavigationResult::failure(message);
            }
        };

        let Some(rx) = self.ctx.subscribe(&session.id) else {
            return self.terminated(&session.id).await;
        };
        self.await_stop(&session, rx, None, true).await
    }

    pub async fn stack_trace(&self, session_id: Option<&SessionId>) -> Result<Vec<StackFrame>> {
        let session = self.ctx.require_active(session_id)?;
        let thread_id = self.resolve_thread(&session).await?;
        self.protocol.stack_trace(&session, thread_id).await
    }

    async fn resume(
        &self,
        session: &Session,
        request: &ResumeRequest,
        initial: Option<&StackFrame>,
    ) -> NavigationResult {
        // Subscribe first so a fast stop cannot slip between request and wait
        self.ctx.clear_last_stop(&session.id);
        let Some(rx) = self.ctx.subscribe(&session.id) else {
            return self.terminated(&session.id).await;
        };

        if let Err(err) = self.protocol.resume(session, request).await {
            tracing::warn!(session = %session.id, command = request.command, error = %err, "resume request failed");
            tokio::time::sleep(self.timing.failure_grace()).await;
            let (console, raw) = self.output_snapshot(&session.id);
            return NavigationResult::terminated(console, raw).with_error(err.to_string());
        }

        self.await_stop(session, rx, initial, false).await
    }

    async fn await_stop(
        &self,
        session: &Session,
        mut rx: watch::Receiver<SessionSignal>,
        initial: Option<&StackFrame>,
        accept_current: bool,
    ) -> NavigationResult {
        let stop_timeout = self.timing.stop_timeout();
        let received = match wait_for_signal(&mut rx, stop_timeout, accept_current).await {
            WaitOutcome::Stopped(event) => event,
            WaitOutcome::Terminated => return self.terminated(&session.id).await,
            WaitOutcome::TimedOut => {
                tracing::warn!(
                    session = %session.id,
                    timeout_ms = stop_timeout.as_millis() as u64,
                    "no stop within timeout; debuggee still running"
                );
                return NavigationResult::stopped(StopReason::Running, None, None);
            }
        };

        tokio::time::sleep(self.timing.reconcile_delay()).await;
        let event = reconcile(received, self.ctx.take_last_stop(&session.id));

        let Some(thread_id) = event.thread_id.or_else(|| self.ctx.last_thread(&session.id)) else {
            return self.compose(event, None, None);
        };

        match self.await_frame_change(session, thread_id, initial).await {
            Some(FramePoll::Terminated) => self.terminated(&session.id).await,
            Some(FramePoll::Moved(frame)) => self.compose(event, Some(frame), Some(thread_id)),
            None => {
                // Position did not change within the poll budget; report it as is
                let frame = self.protocol.top_frame(session, thread_id).await.ok().flatten();
                self.compose(event, frame, Some(thread_id))
            }
        }
    }

    async fn await_frame_change(
        &self,
        session: &Session,
        thread_id: i64,
        initial: Option<&StackFrame>,
    ) -> Option<FramePoll> {
        let ctx = &self.ctx;
        let protocol = &self.protocol;
        poll_until(self.timing.poll_policy(), move || async move {
            if !matches!(ctx.current_signal(&session.id), Some(SessionSignal::Stopped(_))) {
                return Some(FramePoll::Terminated);
            }
            match protocol.top_frame(session, thread_id).await {
                Ok(Some(frame)) if initial.is_none_or(|i| !i.same_position(&frame)) => {
                    Some(FramePoll::Moved(frame))
                }
                _ => None,
            }
        })
        .await
    }

    fn compose(
        &self,
        event: StopEvent,
        frame: Option<StackFrame>,
        thread_id: Option<i64>,
    ) -> NavigationResult {
        let exception_message = match &event.exception {
            Some(ExceptionCapture::Resolved { info }) => compose_exception_message(info),
            Some(ExceptionCapture::Failed { error }) => event
                .description
                .clone()
                .or_else(|| Some(format!("exception details unavailable: {}", error))),
            None => None,
        };

        tracing::debug!(
            session = %event.session_id,
            reason = %event.reason,
            line = frame.as_ref().map(|f| f.line),
            "navigation settled"
        );

        NavigationResult {
            exception_message,
            captured_console_output: event.captured_console_output,
            captured_raw_output: event.captured_raw_output,
            ..NavigationResult::stopped(event.reason, frame, thread_id)
        }
    }

    /// Terminal result carrying whatever output the session left behind
    async fn terminated(&self, session_id: &SessionId) -> NavigationResult {
        let output = &self.output;
        let policy = PollPolicy::new(
            self.timing.poll_policy().interval,
            self.timing.termination_grace(),
        );
        let finalized = poll_until(policy, move || async move {
            output
                .has_finalized(session_id)
                .then(|| output.finalized_streams(session_id))
        })
        .await;

        let (console, raw) = finalized.unwrap_or_else(|| {
            tracing::debug!(session = %session_id, "output not finalized within grace window");
            self.output.active_streams(session_id)
        });
        tracing::info!(session = %session_id, "session terminated during navigation");
        NavigationResult::terminated(console, raw)
    }

    fn output_snapshot(&self, session_id: &SessionId) -> (Option<String>, Option<String>) {
        if self.output.has_finalized(session_id) {
            self.output.finalized_streams(session_id)
        } else {
            self.output.active_streams(session_id)
        }
    }

    /// Resolve the thread to drive, preferring the thread of the last stop
    async fn resolve_thread(&self, session: &Session) -> Result<i64> {
        let attempts = self.timing.thread_retry_attempts.max(1);
        let preferred = self.ctx.last_thread(&session.id);

        for attempt in 1..=attempts {
            match self.protocol.threads(session).await {
                Ok(threads) => {
                    if let Some(id) = preferred
                        && threads.iter().any(|t| t.id == id)
                    {
                        return Ok(id);
                    }
                    if let Some(thread) = threads.first() {
                        return Ok(thread.id);
                    }
                    tracing::debug!(session = %session.id, attempt, "adapter reported no threads");
                }
                Err(err) => {
                    tracing::debug!(session = %session.id, attempt, error = %err, "threads request failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.timing.thread_retry_backoff()).await;
            }
        }

        Err(Error::ThreadResolutionFailed { attempts })
    }
}

fn current_source(frame: Option<&StackFrame>) -> Result<PathBuf> {
    frame
        .and_then(|f| f.source_path.clone())
        .ok_or_else(|| Error::InvalidInput("current frame has no source file".to_string()))
}

/// Prefer the last known stop over the one a waiter received when it is a
/// different, exception-carrying stop.
///
/// Output captured by the superseded stop is carried over so it is not lost.
fn reconcile(received: StopEvent, latest: Option<StopEvent>) -> StopEvent {
    match latest {
        Some(mut latest) if latest.seq != received.seq && latest.has_exception_detail() => {
            tracing::debug!(
                session = %latest.session_id,
                received = received.seq,
                preferred = latest.seq,
                "reconciled to later exception stop"
            );
            latest.captured_console_output = concat_output(
                received.captured_console_output,
                latest.captured_console_output,
            );
            latest.captured_raw_output =
                concat_output(received.captured_raw_output, latest.captured_raw_output);
            latest
        }
        _ => received,
    }
}

fn concat_output(earlier: Option<String>, later: Option<String>) -> Option<String> {
    match (earlier, later) {
        (Some(mut earlier), Some(later)) => {
            earlier.push_str(&later);
            Some(earlier)
        }
        (earlier, later) => earlier.or(later),
    }
}

/// Human-readable exception text: formatted traceback first, then type,
/// then description, leaving out parts the text already contains.
pub fn compose_exception_message(info: &ExceptionInfo) -> Option<String> {
    let details = info.details.as_ref();
    let traceback = details
        .and_then(|d| d.stack_trace.as_deref())
        .map(str::trim_end)
        .filter(|s| !s.is_empty());
    let type_name = details
        .and_then(|d| d.full_type_name.as_deref().or(d.type_name.as_deref()))
        .unwrap_or(info.exception_id.as_str())
        .trim();
    let type_name = (!type_name.is_empty()).then_some(type_name);
    let description = info
        .description
        .as_deref()
        .or_else(|| details.and_then(|d| d.message.as_deref()))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(traceback) = traceback {
        let mut message = traceback.to_string();
        for part in [type_name, description].into_iter().flatten() {
            if !message.contains(part) {
                message.push('\n');
                message.push_str(part);
            }
        }
        return Some(message);
    }

    match (type_name, description) {
        (Some(t), Some(d)) if d.contains(t) => Some(d.to_string()),
        (Some(t), Some(d)) => Some(format!("{}: {}", t, d)),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(d)) => Some(d.to_string()),
        (None, None) => None,
    }
}
