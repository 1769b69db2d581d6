//! Shared fixture for CLI integration tests.
#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestFixture {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("dapflow").join("config.toml");
        Self {
            temp_dir,
            config_path,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn write_config(&self, contents: &str) {
        let parent = self.config_path.parent().expect("config has a parent");
        fs::create_dir_all(parent).expect("Failed to create config dir");
        fs::write(&self.config_path, contents).expect("Failed to write config");
    }

    /// Create a source file and return its absolute path
    pub fn source_file(&self, name: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, "print('hi')\n").expect("Failed to write source file");
        path
    }

    /// `dapflow` pointed at this fixture's config, isolated from the caller's environment
    #[allow(deprecated)]
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("dapflow").expect("binary is built");
        cmd.env_remove("DAPFLOW_CONFIG")
            .env_remove("DAPFLOW_LOG")
            .arg("--config")
            .arg(&self.config_path);
        cmd
    }
}

pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
