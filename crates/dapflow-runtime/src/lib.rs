//! Orchestration layer: shared session state, the host seams and the
//! components that turn protocol traffic into launch/navigation results.

pub mod breakpoints;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod launch;
pub mod navigation;
pub mod output;
pub mod protocol;
pub mod pytest;
pub mod session;
pub mod tracker;

pub use breakpoints::{BreakpointManager, BreakpointOutcome};
pub use config::{DebugConfig, OutputConfig, TimingConfig, resolve_config_path};
pub use context::{DebugContext, DebugEvent, SessionSignal, WaitOutcome, wait_for_signal};
pub use error::{Error, Result};
pub use host::{DebugHost, HostError, HostEvent};
pub use launch::{PreparedLaunch, detect_mode, prepare, synthesize};
pub use navigation::{LaunchOutcome, Navigation, NavigationExecutor, compose_exception_message};
pub use output::{
    BufferedTerminalCapture, OutputBuffers, OutputCaptureStore, QuiescencePolicy,
    RawOutputCapturer,
};
pub use protocol::{ProtocolClient, ResumeRequest, StepCommand};
pub use session::SessionManager;
pub use tracker::StopEventTracker;
