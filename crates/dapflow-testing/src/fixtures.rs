//! Configurations tuned for tests.
//!
//! Production defaults wait seconds for adapters; the fake host answers
//! immediately, so every delay is cut to a few milliseconds while keeping
//! timeouts generous enough for slow CI machines.

use dapflow_runtime::{DebugConfig, OutputConfig, TimingConfig};

pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        stop_timeout_ms: 5_000,
        poll_interval_ms: 10,
        poll_timeout_ms: 500,
        breakpoint_lookup_timeout_ms: 100,
        settle_delay_ms: 5,
        reconcile_delay_ms: 20,
        failure_grace_ms: 20,
        termination_grace_ms: 2_000,
        session_start_timeout_ms: 2_000,
        quit_timeout_ms: 1_000,
        request_timeout_ms: 1_000,
        thread_retry_attempts: 5,
        thread_retry_backoff_ms: 10,
    }
}

pub fn fast_output() -> OutputConfig {
    OutputConfig {
        quiescence_interval_ms: 10,
        quiescence_attempts: 5,
    }
}

pub fn fast_config() -> DebugConfig {
    DebugConfig {
        timing: fast_timing(),
        output: fast_output(),
        ..DebugConfig::default()
    }
}
