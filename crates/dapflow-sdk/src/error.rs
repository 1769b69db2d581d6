use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling a [`crate::Debugger`].
///
/// Debugging operations themselves never return this; they report failure
/// through their result objects.
#[derive(Debug)]
pub enum Error {
    InvalidInput(String),
    Runtime(dapflow_runtime::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Runtime(err) => write!(f, "Runtime error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Runtime(err) => Some(err),
            _ => None,
        }
    }
}

impl From<dapflow_runtime::Error> for Error {
    fn from(err: dapflow_runtime::Error) -> Self {
        Error::Runtime(err)
    }
}
