//! dapflow-sdk: drive debug sessions through a Debug Adapter Protocol host.
//!
//! # Overview
//!
//! `dapflow-sdk` turns the asynchronous, eventually consistent world of a
//! debug host into request/response calls. Every call suspends until the
//! debuggee has settled (paused, terminated, or still running after the stop
//! timeout) and returns a plain result object with the frame, stop reason,
//! exception text and output captured since the previous stop.
//!
//! # Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use dapflow_sdk::{Debugger, DebugConfig, DebugHost, types::LaunchParams};
//!
//! # async fn run(host: Arc<dyn DebugHost>) -> Result<(), Box<dyn std::error::Error>> {
//! let debugger = Debugger::new(host, DebugConfig::load()?)?;
//!
//! // Pauses on the first line of the program
//! let paused = debugger.launch(LaunchParams::program("app.py")).await;
//! println!("stopped: {} at {:?}", paused.stop_reason, paused.frame);
//!
//! let result = debugger.until(12).await;
//! if let Some(message) = result.exception_message {
//!     eprintln!("{}", message);
//! }
//! debugger.quit().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! This SDK is a facade over:
//! - `dapflow-types`: domain, protocol and result types
//! - `dapflow-core`: path normalization and the shared polling loop
//! - `dapflow-runtime`: stop tracking, output capture, breakpoints, navigation
//!
//! The host integration implements [`DebugHost`] (and optionally
//! [`RawOutputCapturer`] for terminal output); everything else is internal.
//!
//! ## Observing events
//!
//! ```no_run
//! use dapflow_sdk::{Debugger, DebugEvent};
//! use futures::stream::StreamExt;
//!
//! # async fn watch(debugger: &Debugger) {
//! let mut events = debugger.events();
//! while let Some(event) = events.next().await {
//!     if let DebugEvent::Stopped(stop) = event {
//!         println!("{} stopped: {}", stop.session_id, stop.reason);
//!     }
//! }
//! # }
//! ```

pub mod debugger;
pub mod error;
pub mod events;

pub use debugger::{Debugger, DebuggerBuilder};
pub use error::{Error, Result};
pub use events::{DebugEvent, EventStream};

pub use dapflow_runtime::{
    BufferedTerminalCapture, DebugConfig, DebugHost, HostError, HostEvent, Navigation,
    OutputConfig, RawOutputCapturer, TimingConfig,
};

/// Domain, protocol and result types
pub mod types {
    pub use dapflow_types::*;
}
