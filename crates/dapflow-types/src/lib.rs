pub mod breakpoint;
pub mod error;
pub mod frame;
pub mod launch;
pub mod protocol;
pub mod result;
pub mod session;
pub mod stop;

pub use breakpoint::{Breakpoint, HostBreakpoint, Location};
pub use error::{Error, Result};
pub use frame::StackFrame;
pub use launch::{LaunchConfiguration, LaunchMode, LaunchParams};
pub use protocol::{
    ExceptionBreakMode, ExceptionDetails, ExceptionInfo, GotoTarget, OutputBody,
    ProtocolMessage, StoppedBody, Thread,
};
pub use result::{
    BreakpointListResult, BreakpointRemovalResult, BreakpointResult, NavigationResult,
    OperationResult, StackTraceResult,
};
pub use session::{Session, SessionId, TerminalHandle};
pub use stop::{ExceptionCapture, StopEvent, StopReason};
