//! Scripts describing what a fake debuggee does on each line.

use dapflow_types::{ExceptionBreakMode, ExceptionDetails, ExceptionInfo};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A debuggee executed one line at a time by [`crate::FakeHost`].
///
/// Lines are one-based. Executing a line emits its output, then raises its
/// exception if one is scripted. Running past the last line exits.
#[derive(Debug, Clone)]
pub struct FakeProgram {
    pub(crate) path: PathBuf,
    pub(crate) line_count: u32,
    pub(crate) output: BTreeMap<u32, Vec<String>>,
    pub(crate) exception: Option<(u32, ExceptionInfo)>,
    pub(crate) telemetry: Vec<String>,
}

impl FakeProgram {
    pub fn new(path: impl Into<PathBuf>, line_count: u32) -> Self {
        Self {
            path: path.into(),
            line_count,
            output: BTreeMap::new(),
            exception: None,
            telemetry: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    /// Print `text` when `line` executes
    pub fn with_output(mut self, line: u32, text: impl Into<String>) -> Self {
        self.output.entry(line).or_default().push(text.into());
        self
    }

    /// Raise `info` while executing `line`
    pub fn with_exception(mut self, line: u32, info: ExceptionInfo) -> Self {
        self.exception = Some((line, info));
        self
    }

    /// Raise a Python-style `ValueError(message)` with a formatted traceback
    pub fn raising_value_error(self, line: u32, message: &str) -> Self {
        let traceback = format!(
            "Traceback (most recent call last):\n  File \"{}\", line {}, in <module>\nValueError: {}\n",
            self.path.display(),
            line,
            message
        );
        let info = ExceptionInfo {
            exception_id: "ValueError".to_string(),
            description: Some(message.to_string()),
            break_mode: ExceptionBreakMode::Unhandled,
            details: Some(ExceptionDetails {
                message: Some(message.to_string()),
                type_name: Some("ValueError".to_string()),
                full_type_name: Some("ValueError".to_string()),
                stack_trace: Some(traceback),
            }),
        };
        self.with_exception(line, info)
    }

    /// Adapter bookkeeping output sent right after launch
    pub fn with_telemetry(mut self, text: impl Into<String>) -> Self {
        self.telemetry.push(text.into());
        self
    }

    pub(crate) fn output_for(&self, line: u32) -> &[String] {
        self.output.get(&line).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn exception_at(&self, line: u32) -> Option<&ExceptionInfo> {
        self.exception
            .as_ref()
            .filter(|(at, _)| *at == line)
            .map(|(_, info)| info)
    }
}
