//! Typed protocol requests issued through the host.

use crate::host::DebugHost;
use crate::{Error, Result};
use dapflow_types::protocol::{GotoTargetsResponse, StackTraceResponse, ThreadsResponse};
use dapflow_types::{ExceptionInfo, GotoTarget, Session, StackFrame, Thread};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Execution-control requests that resume the debuggee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCommand {
    Continue,
    Next,
    StepIn,
    StepOut,
}

impl StepCommand {
    pub fn command(&self) -> &'static str {
        match self {
            StepCommand::Continue => "continue",
            StepCommand::Next => "next",
            StepCommand::StepIn => "stepIn",
            StepCommand::StepOut => "stepOut",
        }
    }
}

/// A request that resumes the debuggee, ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeRequest {
    pub command: &'static str,
    pub arguments: Value,
}

impl ResumeRequest {
    pub fn step(command: StepCommand, thread_id: i64) -> Self {
        Self {
            command: command.command(),
            arguments: json!({ "threadId": thread_id }),
        }
    }

    pub fn goto(thread_id: i64, target_id: i64) -> Self {
        Self {
            command: "goto",
            arguments: json!({ "threadId": thread_id, "targetId": target_id }),
        }
    }
}

/// Request helper bounding every call by the request timeout.
///
/// A timed-out request is not cancelled at the adapter; its late response
/// is simply dropped.
#[derive(Clone)]
pub struct ProtocolClient {
    host: Arc<dyn DebugHost>,
    request_timeout: Duration,
}

impl ProtocolClient {
    pub fn new(host: Arc<dyn DebugHost>, request_timeout: Duration) -> Self {
        Self {
            host,
            request_timeout,
        }
    }

    pub async fn send(&self, session: &Session, command: &str, arguments: Value) -> Result<Value> {
        tracing::debug!(session = %session.id, command, "sending request");
        let response = tokio::time::timeout(
            self.request_timeout,
            self.host.send_request(session, command, arguments),
        )
        .await
        .map_err(|_| Error::ProtocolRequestFailed {
            command: command.to_string(),
            message: format!("no response within {}ms", self.request_timeout.as_millis()),
        })?;

        response.map_err(|err| Error::ProtocolRequestFailed {
            command: command.to_string(),
            message: err.to_string(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        session: &Session,
        command: &str,
        arguments: Value,
    ) -> Result<T> {
        let body = self.send(session, command, arguments).await?;
        serde_json::from_value(body).map_err(|err| Error::ProtocolRequestFailed {
            command: command.to_string(),
            message: format!("unexpected response body: {}", err),
        })
    }

    pub async fn resume(&self, session: &Session, request: &ResumeRequest) -> Result<()> {
        self.send(session, request.command, request.arguments.clone())
            .await
            .map(|_| ())
    }

    pub async fn threads(&self, session: &Session) -> Result<Vec<Thread>> {
        let response: ThreadsResponse = self.request(session, "threads", json!({})).await?;
        Ok(response.threads)
    }

    pub async fn stack_trace(&self, session: &Session, thread_id: i64) -> Result<Vec<StackFrame>> {
        let response: StackTraceResponse = self
            .request(
                session,
                "stackTrace",
                json!({ "threadId": thread_id, "startFrame": 0 }),
            )
            .await?;
        Ok(response.stack_frames.into_iter().map(Into::into).collect())
    }

    pub async fn top_frame(&self, session: &Session, thread_id: i64) -> Result<Option<StackFrame>> {
        let response: StackTraceResponse = self
            .request(
                session,
                "stackTrace",
                json!({ "threadId": thread_id, "startFrame": 0, "levels": 1 }),
            )
            .await?;
        Ok(response.stack_frames.into_iter().next().map(Into::into))
    }

    pub async fn exception_info(&self, session: &Session, thread_id: i64) -> Result<ExceptionInfo> {
        self.request(session, "exceptionInfo", json!({ "threadId": thread_id }))
            .await
    }

    pub async fn goto_targets(
        &self,
        session: &Session,
        path: &Path,
        line: u32,
    ) -> Result<Vec<GotoTarget>> {
        let response: GotoTargetsResponse = self
            .request(
                session,
                "gotoTargets",
                json!({ "source": { "path": path }, "line": line }),
            )
            .await?;
        Ok(response.targets)
    }
}
