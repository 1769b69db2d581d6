//! Seams to the host IDE: session lifecycle, protocol transport and the
//! breakpoint store. The core never talks to an adapter any other way.

use async_trait::async_trait;
use dapflow_types::{
    HostBreakpoint, LaunchConfiguration, ProtocolMessage, Session, SessionId, TerminalHandle,
};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Notifications pushed by the host, in arrival order
#[derive(Debug, Clone)]
pub enum HostEvent {
    SessionStarted(Session),
    SessionTerminated(Session),
    Message {
        session_id: SessionId,
        message: ProtocolMessage,
    },
    /// A terminal the debuggee writes to was opened; `None` means the active session
    TerminalOpened {
        session_id: Option<SessionId>,
        terminal: TerminalHandle,
    },
}

/// Failure reported by a host collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostError {}

/// The host IDE as seen by the core.
///
/// The breakpoint store is eventually consistent: a successful
/// `add_breakpoints` may not be visible through `breakpoints()` yet.
#[async_trait]
pub trait DebugHost: Send + Sync {
    /// Ask the host to start a session. `Ok(false)` means the host declined.
    async fn start_debugging(&self, configuration: &LaunchConfiguration) -> Result<bool, HostError>;

    async fn stop_debugging(&self, session: &Session) -> Result<(), HostError>;

    /// The host's own idea of the active session; only used as a cross-check
    fn active_debug_session(&self) -> Option<Session>;

    /// Send a protocol request to the session's adapter and return the response body
    async fn send_request(
        &self,
        session: &Session,
        command: &str,
        arguments: Value,
    ) -> Result<Value, HostError>;

    fn breakpoints(&self) -> Vec<HostBreakpoint>;

    async fn add_breakpoints(&self, breakpoints: Vec<HostBreakpoint>) -> Result<(), HostError>;

    async fn remove_breakpoints(&self, breakpoints: Vec<HostBreakpoint>) -> Result<(), HostError>;

    /// Hand out the event receiver. Yields `Some` exactly once.
    fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<HostEvent>>;
}
