use crate::protocol::ExceptionInfo;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why execution paused, or why a navigation call ended without pausing.
///
/// Serialized as the plain protocol string (`"breakpoint"`, `"terminated"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopReason {
    Step,
    Breakpoint,
    Exception,
    Pause,
    Entry,
    Goto,
    FunctionBreakpoint,
    DataBreakpoint,
    InstructionBreakpoint,
    /// Session ended before (or instead of) pausing
    Terminated,
    /// No pause happened within the stop timeout; the debuggee is still running
    Running,
    Other(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            StopReason::Step => "step",
            StopReason::Breakpoint => "breakpoint",
            StopReason::Exception => "exception",
            StopReason::Pause => "pause",
            StopReason::Entry => "entry",
            StopReason::Goto => "goto",
            StopReason::FunctionBreakpoint => "function breakpoint",
            StopReason::DataBreakpoint => "data breakpoint",
            StopReason::InstructionBreakpoint => "instruction breakpoint",
            StopReason::Terminated => "terminated",
            StopReason::Running => "running",
            StopReason::Other(reason) => reason,
        }
    }
}

impl From<String> for StopReason {
    fn from(reason: String) -> Self {
        match reason.as_str() {
            "step" => StopReason::Step,
            "breakpoint" => StopReason::Breakpoint,
            "exception" => StopReason::Exception,
            "pause" => StopReason::Pause,
            "entry" => StopReason::Entry,
            "goto" => StopReason::Goto,
            "function breakpoint" => StopReason::FunctionBreakpoint,
            "data breakpoint" => StopReason::DataBreakpoint,
            "instruction breakpoint" => StopReason::InstructionBreakpoint,
            "terminated" => StopReason::Terminated,
            "running" => StopReason::Running,
            _ => StopReason::Other(reason),
        }
    }
}

impl From<&str> for StopReason {
    fn from(reason: &str) -> Self {
        StopReason::from(reason.to_string())
    }
}

impl From<StopReason> for String {
    fn from(reason: StopReason) -> Self {
        reason.as_str().to_string()
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the `exceptionInfo` request issued for an exception stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExceptionCapture {
    Resolved { info: ExceptionInfo },
    Failed { error: String },
}

/// A pause reported by the adapter, enriched by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEvent {
    /// Monotonic sequence assigned by the tracker; distinguishes otherwise identical stops
    pub seq: u64,
    pub session_id: SessionId,
    pub reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionCapture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_console_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_raw_output: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl StopEvent {
    /// Whether this is an exception stop with resolved exception detail
    pub fn has_exception_detail(&self) -> bool {
        self.reason == StopReason::Exception
            && matches!(self.exception, Some(ExceptionCapture::Resolved { .. }))
    }

    pub fn exception_info(&self) -> Option<&ExceptionInfo> {
        match &self.exception {
            Some(ExceptionCapture::Resolved { info }) => Some(info),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_string_mapping() {
        assert_eq!(StopReason::from("breakpoint"), StopReason::Breakpoint);
        assert_eq!(StopReason::from("data breakpoint"), StopReason::DataBreakpoint);
        assert_eq!(
            StopReason::from("custom"),
            StopReason::Other("custom".to_string())
        );
        assert_eq!(StopReason::Terminated.to_string(), "terminated");
    }

    #[test]
    fn test_stop_reason_serializes_as_plain_string() -> anyhow::Result<()> {
        let json = serde_json::to_string(&StopReason::Terminated)?;
        assert_eq!(json, "\"terminated\"");

        let parsed: StopReason = serde_json::from_str("\"exception\"")?;
        assert_eq!(parsed, StopReason::Exception);
        Ok(())
    }
}
