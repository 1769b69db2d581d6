//! Custom assertions for navigation results.
//!
//! Return `anyhow::Result` so failures print the whole result object.

use anyhow::{Context, Result, bail};
use dapflow_core::paths_equal;
use dapflow_types::{NavigationResult, StopReason};
use std::path::Path;

/// Assert the debuggee is paused at `path:line` (one-based).
pub fn assert_paused_at(result: &NavigationResult, path: &Path, line: u32) -> Result<()> {
    if !result.success {
        bail!("Expected a paused result, got failure: {:?}", result);
    }
    let frame = result
        .frame
        .as_ref()
        .with_context(|| format!("Expected a frame in {:?}", result))?;
    let source = frame
        .source_path
        .as_deref()
        .with_context(|| format!("Frame has no source path: {:?}", frame))?;

    if !paths_equal(source, path) || frame.line != line {
        bail!(
            "Expected pause at {}:{}, got {}:{}",
            path.display(),
            line,
            source.display(),
            frame.line
        );
    }
    Ok(())
}

/// Assert the result reports a terminated session.
pub fn assert_terminated(result: &NavigationResult) -> Result<()> {
    if result.success || result.stop_reason != StopReason::Terminated {
        bail!("Expected a terminated result, got {:?}", result);
    }
    Ok(())
}
