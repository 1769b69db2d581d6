//! Result objects returned by the public facade.
//!
//! Every public operation reports failure through `success: false` plus an
//! `error_message`; callers never have to handle an `Err` for normal
//! failure modes such as a vanished session or an adapter rejection.

use crate::breakpoint::Breakpoint;
use crate::frame::StackFrame;
use crate::stop::StopReason;
use serde::{Deserialize, Serialize};

/// Unified outcome of launch and every navigation command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationResult {
    pub success: bool,
    pub stop_reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<StackFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_console_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_raw_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl NavigationResult {
    pub fn stopped(stop_reason: StopReason, frame: Option<StackFrame>, thread_id: Option<i64>) -> Self {
        Self {
            success: true,
            stop_reason,
            frame,
            thread_id,
            exception_message: None,
            captured_console_output: None,
            captured_raw_output: None,
            error_message: None,
        }
    }

    pub fn terminated(console: Option<String>, raw: Option<String>) -> Self {
        Self {
            success: false,
            stop_reason: StopReason::Terminated,
            frame: None,
            thread_id: None,
            exception_message: None,
            captured_console_output: console,
            captured_raw_output: raw,
            error_message: None,
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            error_message: Some(error_message.into()),
            ..Self::terminated(None, None)
        }
    }

    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OperationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(error_message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakpoint: Option<Breakpoint>,
    /// Whether the host read-back confirmed the breakpoint before the timeout
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl BreakpointResult {
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            breakpoint: None,
            verified: false,
            error_message: Some(error_message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointRemovalResult {
    pub success: bool,
    pub removed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointListResult {
    pub success: bool,
    pub breakpoints: Vec<Breakpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResult {
    pub success: bool,
    pub frames: Vec<StackFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminated_result_shape() -> anyhow::Result<()> {
        let result = NavigationResult::terminated(Some("bye\n".to_string()), None);
        let json = serde_json::to_value(&result)?;

        assert_eq!(json["success"], false);
        assert_eq!(json["stopReason"], "terminated");
        assert_eq!(json["capturedConsoleOutput"], "bye\n");
        assert!(json.get("capturedRawOutput").is_none());
        Ok(())
    }

    #[test]
    fn test_failure_carries_error_message() {
        let result = NavigationResult::failure("No active debug session");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("No active debug session"));
    }
}
