use crate::{Error, Result};
use dapflow_core::{PollPolicy, expand_tilde};
use dapflow_types::LaunchConfiguration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolve the configuration file path based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. DAPFLOW_CONFIG environment variable (with tilde expansion)
/// 3. System config directory
/// 4. ~/.dapflow/config.toml (fallback for systems without a config directory)
pub fn resolve_config_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("DAPFLOW_CONFIG") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        return Ok(config_dir.join("dapflow").join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".dapflow").join("config.toml"));
    }

    Err(Error::Config(
        "Could not determine config path: no HOME directory or system config directory found"
            .to_string(),
    ))
}

/// Delays and timeouts, all in milliseconds.
///
/// `stop_timeout_ms` bounds how long a navigation command waits for the
/// debuggee to pause; it is a program execution budget, not a protocol
/// latency, hence the one-day default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub stop_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub breakpoint_lookup_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub reconcile_delay_ms: u64,
    pub failure_grace_ms: u64,
    pub termination_grace_ms: u64,
    pub session_start_timeout_ms: u64,
    pub quit_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub thread_retry_attempts: u32,
    pub thread_retry_backoff_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: 24 * 60 * 60 * 1000,
            poll_interval_ms: 100,
            poll_timeout_ms: 5_000,
            breakpoint_lookup_timeout_ms: 1_000,
            settle_delay_ms: 100,
            reconcile_delay_ms: 150,
            failure_grace_ms: 500,
            termination_grace_ms: 2_000,
            session_start_timeout_ms: 30_000,
            quit_timeout_ms: 10_000,
            request_timeout_ms: 10_000,
            thread_retry_attempts: 5,
            thread_retry_backoff_ms: 200,
        }
    }
}

impl TimingConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Verification polls: breakpoint read-back and stack confirmation
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.poll_timeout_ms),
        )
    }

    /// Lookups of an existing breakpoint before remove/replace
    pub fn lookup_policy(&self) -> PollPolicy {
        self.poll_policy()
            .with_timeout(Duration::from_millis(self.breakpoint_lookup_timeout_ms))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    pub fn failure_grace(&self) -> Duration {
        Duration::from_millis(self.failure_grace_ms)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    pub fn session_start_timeout(&self) -> Duration {
        Duration::from_millis(self.session_start_timeout_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn thread_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.thread_retry_backoff_ms)
    }
}

/// Quiescence detection for output finalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub quiescence_interval_ms: u64,
    pub quiescence_attempts: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quiescence_interval_ms: 200,
            quiescence_attempts: 5,
        }
    }
}

impl OutputConfig {
    pub fn quiescence_interval(&self) -> Duration {
        Duration::from_millis(self.quiescence_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Launch configuration registry, looked up by name
    #[serde(default)]
    pub configurations: Vec<LaunchConfiguration>,
}

impl DebugConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: DebugConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        resolve_config_path(None)
    }

    pub fn configuration(&self, name: &str) -> Option<&LaunchConfiguration> {
        self.configurations.iter().find(|c| c.name == name)
    }
}
