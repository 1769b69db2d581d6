//! The pytest plugin that turns test failures into debugger stops.
//!
//! pytest catches every test exception itself, so an adapter with
//! uncaught-exception breakpoints never sees one. The plugin re-raises from
//! `pytest_exception_interact` when [`PYTEST_RAISE_ENV`] is set. It ships
//! inside the binary and is written to disk on first use.

use crate::launch::PYTEST_RAISE_ENV;
use crate::{Error, Result};
use dapflow_types::LaunchConfiguration;
use std::path::{Path, PathBuf};

/// Module name passed to `pytest -p`
pub const PLUGIN_MODULE: &str = "dapflow_pytest_raise";

const PLUGIN_SOURCE: &str = include_str!("../assets/dapflow_pytest_raise.py");

/// Directories tried in order when installing the plugin
pub fn plugin_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(cache) = dirs::cache_dir() {
        dirs.push(cache.join("dapflow").join("pytest"));
    }
    dirs.push(std::env::temp_dir().join("dapflow-pytest"));
    dirs
}

/// Write the plugin into `dir`, leaving an identical copy alone
pub fn install_plugin_in(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("{PLUGIN_MODULE}.py"));
    if std::fs::read_to_string(&path).is_ok_and(|existing| existing == PLUGIN_SOURCE) {
        return Ok(dir.to_path_buf());
    }
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, PLUGIN_SOURCE)?;
    tracing::debug!(path = %path.display(), "installed pytest plugin");
    Ok(dir.to_path_buf())
}

/// Install the plugin into the first writable plugin directory
pub fn install_plugin() -> Result<PathBuf> {
    let mut last_error = None;
    for dir in plugin_dirs() {
        match install_plugin_in(&dir) {
            Ok(dir) => return Ok(dir),
            Err(err) => {
                tracing::debug!(dir = %dir.display(), error = %err, "pytest plugin directory not writable");
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::Config("no pytest plugin directory".to_string())))
}

/// Make `plugin_dir` importable by the debuggee, ahead of any caller `PYTHONPATH`
pub fn wire_plugin(config: &mut LaunchConfiguration, plugin_dir: &Path) -> Result<()> {
    let mut entries = vec![plugin_dir.to_path_buf()];
    if let Some(existing) = config.env.get("PYTHONPATH") {
        entries.extend(
            std::env::split_paths(existing).filter(|entry| entry.as_path() != plugin_dir),
        );
    }
    let joined = std::env::join_paths(entries)
        .map_err(|err| Error::InvalidInput(format!("invalid PYTHONPATH: {err}")))?;
    config
        .env
        .insert("PYTHONPATH".to_string(), joined.to_string_lossy().into_owned());
    config
        .env
        .entry(PYTEST_RAISE_ENV.to_string())
        .or_insert_with(|| "1".to_string());
    Ok(())
}
