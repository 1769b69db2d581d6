//! TestWorld pattern for declarative scenario setup.
//!
//! Provides a fluent interface for:
//! - Creating an isolated directory of debuggee source files
//! - Scripting those files as [`FakeProgram`]s
//! - Writing a config file for CLI tests

use anyhow::{Context, Result};
use dapflow_core::normalize_path;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::program::FakeProgram;

/// Isolated test environment.
///
/// # Example
/// ```no_run
/// use dapflow_testing::TestWorld;
///
/// let world = TestWorld::new();
/// let program = world.program("app.py", 5).with_output(2, "hello\n");
/// assert_eq!(program.line_count(), 5);
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Create a new isolated test environment.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    /// Get the temp directory root.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a source file with `line_count` numbered statements and return
    /// its normalized path.
    pub fn source_file(&self, name: &str, line_count: u32) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create source directory");
        }
        let body: String = (1..=line_count)
            .map(|n| format!("step_{} = {}\n", n, n))
            .collect();
        std::fs::write(&path, body).expect("Failed to write source file");
        normalize_path(&path)
    }

    /// Write a source file and start a script for it.
    pub fn program(&self, name: &str, line_count: u32) -> FakeProgram {
        FakeProgram::new(self.source_file(name, line_count), line_count)
    }

    /// Write `contents` as `config.toml` under the root and return its path.
    pub fn write_config(&self, contents: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join("config.toml");
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
