// NOTE: Why a configuration-only CLI?
//
// Sessions are driven by a host (an editor or a test harness) that owns the
// debug adapters; the binary has no adapter to talk to. What it can answer
// offline is where the config lives, what it contains, and which launch
// configuration a given program would start with.

mod args;
mod commands;
mod handlers;

pub use args::{Cli, Commands, ConfigCommand, ConfigFormat, ModeArg};
pub use commands::run;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "DAPFLOW_LOG";

/// Install the stderr subscriber, filtered by `DAPFLOW_LOG` (default `warn`)
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be set when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
