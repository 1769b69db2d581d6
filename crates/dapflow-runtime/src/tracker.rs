//! Stop-event tracking.
//!
//! A single pump task consumes host events in arrival order. `stopped`
//! messages are enriched (exception detail, buffered output) and published
//! on the session's stop slot; lifecycle notifications re-anchor the active
//! session and trigger output finalization.

use crate::breakpoints::BreakpointManager;
use crate::context::DebugContext;
use crate::host::{DebugHost, HostEvent};
use crate::output::OutputCaptureStore;
use crate::protocol::ProtocolClient;
use chrono::Utc;
use dapflow_core::LocationKey;
use dapflow_types::protocol::StoppedBody;
use dapflow_types::{
    ExceptionCapture, Location, ProtocolMessage, Session, SessionId, StopEvent, StopReason,
    TerminalHandle,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct StopEventTracker {
    host: Arc<dyn DebugHost>,
    ctx: Arc<DebugContext>,
    output: Arc<OutputCaptureStore>,
    protocol: ProtocolClient,
    breakpoints: Arc<BreakpointManager>,
}

impl StopEventTracker {
    pub fn new(
        host: Arc<dyn DebugHost>,
        ctx: Arc<DebugContext>,
        output: Arc<OutputCaptureStore>,
        protocol: ProtocolClient,
        breakpoints: Arc<BreakpointManager>,
    ) -> Self {
        Self {
            host,
            ctx,
            output,
            protocol,
            breakpoints,
        }
    }

    /// Run the event pump until the host drops its sender
    pub fn spawn(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<HostEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(event).await;
            }
            tracing::debug!("host event channel closed; stop tracker exiting");
        })
    }

    pub async fn handle(&self, event: HostEvent) {
        match event {
            HostEvent::SessionStarted(session) => self.on_session_started(session),
            HostEvent::SessionTerminated(session) => self.on_session_terminated(session),
            HostEvent::Message {
                session_id,
                message,
            } => self.on_message(&session_id, message).await,
            HostEvent::TerminalOpened {
                session_id,
                terminal,
            } => self.on_terminal_opened(session_id, terminal).await,
        }
    }

    fn on_session_started(&self, session: Session) {
        // Always a fresh output generation, even while the previous run with
        // this id is still finalizing
        if self.output.reset_session(&session.id) {
            tracing::debug!(session = %session.id, "session id reused; clearing previous output");
        }

        if let Some(host_active) = self.host.active_debug_session()
            && host_active.id != session.id
        {
            tracing::debug!(
                session = %session.id,
                host_active = %host_active.id,
                "host reports a different active session"
            );
        }

        tracing::info!(session = %session.id, kind = %session.kind, name = %session.name, "debug session started");
        self.ctx.begin_session(session);
    }

    fn on_session_terminated(&self, session: Session) {
        tracing::info!(session = %session.id, "debug session terminated");
        self.ctx.clear_active_if(&session.id);
        self.ctx.mark_terminated(&session.id);

        // Off the pump: trailing output events must keep flowing while
        // the quiescence poll runs
        let output = self.output.clone();
        tokio::spawn(async move {
            output.finalize_session(&session.id).await;
        });
    }

    async fn on_terminal_opened(&self, session_id: Option<SessionId>, terminal: TerminalHandle) {
        let Some(session_id) =
            session_id.or_else(|| self.ctx.active_session().map(|session| session.id))
        else {
            tracing::debug!(terminal = terminal.as_str(), "terminal opened with no session to attach to");
            return;
        };
        tracing::debug!(session = %session_id, terminal = terminal.as_str(), "capturing terminal output");
        self.output
            .raw()
            .start_capture_for_session(&session_id, terminal)
            .await;
    }

    async fn on_message(&self, session_id: &SessionId, message: ProtocolMessage) {
        match message {
            ProtocolMessage::Output(body) => {
                if body.is_program_output() {
                    self.output.append_console(session_id, body.output);
                }
            }
            ProtocolMessage::Stopped(body) => self.on_stopped(session_id, body).await,
            ProtocolMessage::Continued(body) => {
                tracing::debug!(session = %session_id, thread = body.thread_id, "continued");
            }
            ProtocolMessage::Exited(body) => {
                tracing::info!(session = %session_id, exit_code = body.exit_code, "debuggee exited");
            }
            ProtocolMessage::Terminated => {
                tracing::debug!(session = %session_id, "adapter reported terminated");
            }
            ProtocolMessage::Other(kind) => {
                tracing::trace!(session = %session_id, kind = %kind, "ignoring protocol message");
            }
        }
    }

    async fn on_stopped(&self, session_id: &SessionId, body: StoppedBody) {
        let Some(session) = self.ctx.session(session_id) else {
            tracing::warn!(session = %session_id, "stopped event for unknown session");
            return;
        };
        let reason = StopReason::from(body.reason);

        let exception = if reason == StopReason::Exception {
            Some(self.fetch_exception(&session, body.thread_id).await)
        } else {
            None
        };

        // Before publishing: the caller cannot resume until it sees the stop
        if self.ctx.has_temporary() {
            self.remove_hit_temporary(&session, body.thread_id).await;
        }

        let (console, raw) = self.output.take_active_streams(session_id);
        let event = StopEvent {
            seq: self.ctx.next_seq(),
            session_id: session_id.clone(),
            reason,
            thread_id: body.thread_id,
            description: body.description.or(body.text),
            exception,
            captured_console_output: console,
            captured_raw_output: raw,
            received_at: Utc::now(),
        };

        tracing::info!(
            session = %session_id,
            reason = %event.reason,
            thread = ?event.thread_id,
            seq = event.seq,
            "debuggee stopped"
        );
        self.ctx.record_stop(event);
    }

    async fn fetch_exception(&self, session: &Session, thread_id: Option<i64>) -> ExceptionCapture {
        let Some(thread_id) = thread_id.or_else(|| self.ctx.last_thread(&session.id)) else {
            return ExceptionCapture::Failed {
                error: "stopped event carried no thread id".to_string(),
            };
        };

        match self.protocol.exception_info(session, thread_id).await {
            Ok(info) => ExceptionCapture::Resolved { info },
            Err(err) => {
                tracing::warn!(session = %session.id, error = %err, "exceptionInfo failed");
                ExceptionCapture::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    async fn remove_hit_temporary(&self, session: &Session, thread_id: Option<i64>) {
        let Some(thread_id) = thread_id.or_else(|| self.ctx.last_thread(&session.id)) else {
            return;
        };

        let frame = match self.protocol.top_frame(session, thread_id).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(err) => {
                tracing::debug!(session = %session.id, error = %err, "no frame to match temporary breakpoints");
                return;
            }
        };
        let Some(path) = frame.source_path else {
            return;
        };

        let location = Location::new(path, frame.line);
        if !self.ctx.is_temporary(&LocationKey::of_location(&location)) {
            return;
        }

        match self.breakpoints.remove_by_location(&location).await {
            Ok(_) => {
                tracing::info!(session = %session.id, path = %location.path.display(), line = location.line, "temporary breakpoint hit and removed");
            }
            Err(err) => {
                tracing::warn!(session = %session.id, error = %err, "failed to remove temporary breakpoint");
            }
        }
    }
}
