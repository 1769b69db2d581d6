use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single call-stack frame.
///
/// Frame ids are only meaningful within the session that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    /// One-based line
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl StackFrame {
    /// Whether two frames describe the same paused position
    pub fn same_position(&self, other: &StackFrame) -> bool {
        self.id == other.id && self.line == other.line
    }
}
