//! Adapter protocol payloads.
//!
//! Inbound events are decoded once at the boundary into [`ProtocolMessage`];
//! nothing downstream handles untyped message bodies. Response bodies of the
//! requests the core issues are modelled alongside.

use crate::error::{Error, Result};
use crate::frame::StackFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Closed set of adapter events the core reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "body", rename_all = "camelCase")]
pub enum ProtocolMessage {
    Stopped(StoppedBody),
    Output(OutputBody),
    Continued(ContinuedBody),
    Exited(ExitedBody),
    Terminated,
    /// Any other event or non-event message; kept only for logging
    Other(String),
}

impl ProtocolMessage {
    /// Decode a raw protocol message (`{"type": "event", "event": ..., "body": ...}`).
    pub fn from_value(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("message has no type".to_string()))?;

        if kind != "event" {
            return Ok(ProtocolMessage::Other(kind.to_string()));
        }

        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("event message has no event name".to_string()))?;
        let body = value.get("body").cloned().unwrap_or(Value::Null);

        let message = match event {
            "stopped" => ProtocolMessage::Stopped(serde_json::from_value(body)?),
            "output" => ProtocolMessage::Output(serde_json::from_value(body)?),
            "continued" => ProtocolMessage::Continued(serde_json::from_value(body)?),
            "exited" => ProtocolMessage::Exited(serde_json::from_value(body)?),
            "terminated" => ProtocolMessage::Terminated,
            other => ProtocolMessage::Other(other.to_string()),
        };
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedBody {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub all_threads_stopped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hit_breakpoint_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub output: String,
}

impl OutputBody {
    /// Telemetry output is adapter bookkeeping, not program output
    pub fn is_program_output(&self) -> bool {
        !matches!(self.category.as_deref(), Some("telemetry"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedBody {
    pub thread_id: i64,
    #[serde(default)]
    pub all_threads_continued: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedBody {
    pub exit_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadsResponse {
    #[serde(default)]
    pub threads: Vec<Thread>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoTarget {
    pub id: i64,
    #[serde(default)]
    pub label: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoTargetsResponse {
    #[serde(default)]
    pub targets: Vec<GotoTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExceptionBreakMode {
    Never,
    Always,
    Unhandled,
    UserUnhandled,
}

/// Body of an `exceptionInfo` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    pub exception_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub break_mode: ExceptionBreakMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStackFrame {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl From<ProtocolStackFrame> for StackFrame {
    fn from(frame: ProtocolStackFrame) -> Self {
        StackFrame {
            id: frame.id,
            name: frame.name,
            source_path: frame.source.and_then(|s| s.path),
            line: frame.line,
            column: frame.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponse {
    #[serde(default)]
    pub stack_frames: Vec<ProtocolStackFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
}
