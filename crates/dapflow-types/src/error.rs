use std::fmt;

/// Result type for dapflow-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while decoding protocol payloads
#[derive(Debug)]
pub enum Error {
    /// Message did not have the expected envelope
    Protocol(String),

    /// Message body did not match the expected schema
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Protocol(_) => None,
            Error::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
