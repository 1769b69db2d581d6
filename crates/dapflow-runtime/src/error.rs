use crate::host::HostError;
use dapflow_types::SessionId;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Result type for dapflow-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the orchestration layer
#[derive(Debug)]
pub enum Error {
    /// No session is tracked as active
    NoActiveSession,

    /// The requested session is not the tracked active session
    InactiveSession(SessionId),

    /// No launch configuration could be synthesized for the program
    UnsupportedLaunchTarget(String),

    /// Named launch configuration is not registered
    UnknownConfiguration(String),

    /// Adapter rejected or failed a protocol request
    ProtocolRequestFailed { command: String, message: String },

    /// No thread could be resolved after all retries
    ThreadResolutionFailed { attempts: u32 },

    /// Adapter offered no goto target for the requested line
    JumpTargetUnavailable { path: PathBuf, line: u32 },

    /// A navigation call is already in flight on the session
    NavigationInProgress(SessionId),

    /// `restart` was called before any successful launch
    NoLaunchSnapshot,

    /// No breakpoint exists at the location
    BreakpointNotFound(String),

    /// The host acknowledged the launch but no session became active
    SessionStartTimeout(Duration),

    /// Caller passed parameters that cannot be acted on
    InvalidInput(String),

    /// Host collaborator error
    Host(HostError),

    /// Configuration error
    Config(String),

    /// IO operation failed
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoActiveSession => write!(f, "No active debug session"),
            Error::InactiveSession(id) => {
                write!(f, "Session {} is not the active debug session", id)
            }
            Error::UnsupportedLaunchTarget(msg) => write!(f, "Unsupported launch target: {}", msg),
            Error::UnknownConfiguration(name) => {
                write!(f, "Launch configuration not found: {}", name)
            }
            Error::ProtocolRequestFailed { command, message } => {
                write!(f, "Request '{}' failed: {}", command, message)
            }
            Error::ThreadResolutionFailed { attempts } => {
                write!(f, "Could not resolve a thread after {} attempts", attempts)
            }
            Error::JumpTargetUnavailable { path, line } => write!(
                f,
                "No jump target available at {}:{}",
                path.display(),
                line
            ),
            Error::NavigationInProgress(id) => {
                write!(f, "A navigation command is already running on session {}", id)
            }
            Error::NoLaunchSnapshot => write!(
                f,
                "Cannot restart: no previous launch parameters are known (launch first)"
            ),
            Error::BreakpointNotFound(location) => {
                write!(f, "No breakpoint found at {}", location)
            }
            Error::SessionStartTimeout(timeout) => write!(
                f,
                "Debug session did not become active within {}s",
                timeout.as_secs()
            ),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Host(err) => write!(f, "Host error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Host(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        Error::Host(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
