use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source location as seen by callers (one-based line and column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub path: PathBuf,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Location {
    pub fn new(path: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column: None,
        }
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    /// Zero-based line used by the host breakpoint store
    pub fn zero_based_line(&self) -> u32 {
        self.line.saturating_sub(1)
    }
}

/// Breakpoint value object.
///
/// Breakpoints are never mutated in place: every "edit" builds a new value
/// and replaces the old one in the host store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub temporary: bool,
}

impl Breakpoint {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            condition: None,
            hit_condition: None,
            log_message: None,
            enabled: true,
            temporary: false,
        }
    }

    pub fn temporary(location: Location) -> Self {
        Self {
            temporary: true,
            ..Self::new(location)
        }
    }

    pub fn with_condition(self, condition: Option<String>) -> Self {
        Self { condition, ..self }
    }

    pub fn with_hit_condition(self, hit_condition: Option<String>) -> Self {
        Self {
            hit_condition,
            ..self
        }
    }

    pub fn with_log_message(self, log_message: Option<String>) -> Self {
        Self {
            log_message,
            ..self
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    /// Convert to the host representation (zero-based positions)
    pub fn to_host(&self) -> HostBreakpoint {
        HostBreakpoint {
            path: self.location.path.clone(),
            line: self.location.zero_based_line(),
            column: self.location.column.map(|c| c.saturating_sub(1)),
            enabled: self.enabled,
            condition: self.condition.clone(),
            hit_condition: self.hit_condition.clone(),
            log_message: self.log_message.clone(),
        }
    }

    /// Build from the host representation. The host has no notion of
    /// temporary breakpoints; callers set the flag from their own records.
    pub fn from_host(host: &HostBreakpoint, temporary: bool) -> Self {
        Self {
            location: Location {
                path: host.path.clone(),
                line: host.line + 1,
                column: host.column.map(|c| c + 1),
            },
            condition: host.condition.clone(),
            hit_condition: host.hit_condition.clone(),
            log_message: host.log_message.clone(),
            enabled: host.enabled,
            temporary,
        }
    }
}

/// Source breakpoint as stored by the host (zero-based positions)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBreakpoint {
    pub path: PathBuf,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

impl HostBreakpoint {
    pub fn path(&self) -> &Path {
        &self.path
    }
}
