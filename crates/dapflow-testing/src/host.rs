//! Scripted in-process debug host.
//!
//! [`FakeHost`] plays both the editor host and the debug adapter: it keeps an
//! eventually consistent breakpoint store, executes [`FakeProgram`] scripts
//! and reports everything through host events in the order a real adapter
//! would (output before the stop it precedes, `exited` before `terminated`).

use crate::program::FakeProgram;
use async_trait::async_trait;
use dapflow_core::normalize_path;
use dapflow_runtime::{BufferedTerminalCapture, DebugHost, HostError, HostEvent};
use dapflow_types::protocol::{ContinuedBody, ExitedBody, OutputBody, StoppedBody};
use dapflow_types::{
    ExceptionInfo, HostBreakpoint, LaunchConfiguration, ProtocolMessage, Session, SessionId,
    TerminalHandle,
};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// The only thread fake debuggees run on
pub const MAIN_THREAD: i64 = 1;

/// Adapter quirks a scenario can switch on
#[derive(Debug, Clone, Default)]
pub struct FakeOptions {
    /// Added breakpoints show up in `breakpoints()` only after this long
    pub breakpoint_visibility_delay: Duration,
    /// Number of `threads` requests that fail before one succeeds
    pub thread_failures: u32,
    /// `stackTrace` reads after each stop that still report the previous position
    pub stale_stack_reads: u32,
    /// Answer `start_debugging` with `false`
    pub refuse_start: bool,
    /// Commands answered with an error
    pub failing_requests: HashSet<String>,
    /// Give every session the same id
    pub reuse_session_id: bool,
    /// Report a `step` stop right before every exception stop
    pub step_before_exception: bool,
}

impl FakeOptions {
    pub fn failing(mut self, command: &str) -> Self {
        self.failing_requests.insert(command.to_string());
        self
    }
}

struct StoredBreakpoint {
    breakpoint: HostBreakpoint,
    visible_at: Instant,
    hits: u32,
}

#[derive(Debug, Clone, Copy)]
struct Position {
    frame_id: i64,
    line: u32,
}

struct Paused {
    position: Position,
    previous: Option<Position>,
    exception: Option<ExceptionInfo>,
    stale_reads: u32,
}

struct Debuggee {
    session: Session,
    program: FakeProgram,
    paused: Option<Paused>,
    last_position: Option<Position>,
}

#[derive(Default)]
struct FakeState {
    programs: HashMap<PathBuf, FakeProgram>,
    breakpoints: Vec<StoredBreakpoint>,
    debuggee: Option<Debuggee>,
    next_session: u64,
    next_frame: i64,
    thread_failures_left: u32,
    launched: Vec<LaunchConfiguration>,
    requests: Vec<String>,
}

/// What one adapter step produced, delivered once the state lock is released
#[derive(Default)]
struct Effects {
    terminal: Vec<(SessionId, String)>,
    events: Vec<HostEvent>,
}

impl Effects {
    fn message(&mut self, session_id: &SessionId, message: ProtocolMessage) {
        self.events.push(HostEvent::Message {
            session_id: session_id.clone(),
            message,
        });
    }

    fn output(&mut self, session_id: &SessionId, category: &str, text: String) {
        if category != "telemetry" {
            self.terminal.push((session_id.clone(), text.clone()));
        }
        self.message(
            session_id,
            ProtocolMessage::Output(OutputBody {
                category: Some(category.to_string()),
                output: text,
            }),
        );
    }

    fn stopped(&mut self, session_id: &SessionId, reason: &str) {
        self.message(
            session_id,
            ProtocolMessage::Stopped(StoppedBody {
                reason: reason.to_string(),
                description: None,
                thread_id: Some(MAIN_THREAD),
                text: None,
                all_threads_stopped: true,
                hit_breakpoint_ids: Vec::new(),
            }),
        );
    }
}

fn not_paused() -> HostError {
    HostError::new("debuggee is not paused")
}

impl FakeState {
    fn same_location(breakpoint: &HostBreakpoint, path: &Path, zero_based_line: u32) -> bool {
        breakpoint.line == zero_based_line && normalize_path(&breakpoint.path) == path
    }

    /// Whether execution pauses before running `line`
    fn breakpoint_hit(&mut self, session_id: &SessionId, line: u32, effects: &mut Effects) -> bool {
        let Some(path) = self.debuggee.as_ref().map(|d| d.program.path.clone()) else {
            return false;
        };
        let Some(stored) = self
            .breakpoints
            .iter_mut()
            .find(|s| Self::same_location(&s.breakpoint, &path, line - 1))
        else {
            return false;
        };

        let bp = &stored.breakpoint;
        if !bp.enabled {
            return false;
        }
        if matches!(bp.condition.as_deref().map(str::trim), Some("False" | "false" | "0")) {
            return false;
        }

        stored.hits += 1;
        if let Some(threshold) = bp
            .hit_condition
            .as_deref()
            .and_then(|c| c.trim().strip_prefix('>'))
            .and_then(|n| n.trim().parse::<u32>().ok())
            && stored.hits <= threshold
        {
            return false;
        }
        if let Some(message) = &bp.log_message {
            effects.output(session_id, "console", format!("{}\n", message));
            return false;
        }
        true
    }

    /// Run `line`: print its output and return the exception it raises, if any
    fn execute(&self, line: u32, effects: &mut Effects) -> Option<ExceptionInfo> {
        let debuggee = self.debuggee.as_ref()?;
        for text in debuggee.program.output_for(line) {
            effects.output(&debuggee.session.id, "stdout", text.clone());
        }
        debuggee.program.exception_at(line).cloned()
    }

    /// Execute from `line` until a breakpoint, an exception or the end.
    ///
    /// The breakpoint on `line` itself only counts when `check_first`.
    fn run_from(&mut self, line: u32, check_first: bool, options: &FakeOptions, effects: &mut Effects) {
        let Some((session_id, line_count)) = self
            .debuggee
            .as_ref()
            .map(|d| (d.session.id.clone(), d.program.line_count))
        else {
            return;
        };

        let mut current = line;
        let mut check = check_first;
        loop {
            if current > line_count {
                self.exit(Some(0), effects);
                return;
            }
            if check && self.breakpoint_hit(&session_id, current, effects) {
                self.pause(current, "breakpoint", None, options, effects);
                return;
            }
            check = true;
            if let Some(info) = self.execute(current, effects) {
                self.pause(current, "exception", Some(info), options, effects);
                return;
            }
            current += 1;
        }
    }

    fn pause(
        &mut self,
        line: u32,
        reason: &str,
        exception: Option<ExceptionInfo>,
        options: &FakeOptions,
        effects: &mut Effects,
    ) {
        self.next_frame += 1;
        let position = Position {
            frame_id: self.next_frame,
            line,
        };
        let Some(debuggee) = self.debuggee.as_mut() else {
            return;
        };

        let raised = exception.is_some();
        debuggee.paused = Some(Paused {
            position,
            previous: debuggee.last_position.replace(position),
            exception,
            stale_reads: options.stale_stack_reads,
        });

        let session_id = debuggee.session.id.clone();
        if raised && options.step_before_exception {
            effects.stopped(&session_id, "step");
        }
        effects.stopped(&session_id, reason);
    }

    /// End the debuggee; `exit_code` is `None` when it was killed
    fn exit(&mut self, exit_code: Option<i64>, effects: &mut Effects) {
        let Some(debuggee) = self.debuggee.take() else {
            return;
        };
        let session_id = &debuggee.session.id;
        if let Some(exit_code) = exit_code {
            effects.message(session_id, ProtocolMessage::Exited(ExitedBody { exit_code }));
        }
        effects.message(session_id, ProtocolMessage::Terminated);
        effects
            .events
            .push(HostEvent::SessionTerminated(debuggee.session));
    }

    /// Leave the paused state; `None` when the debuggee dies instead
    fn unpause(&mut self, effects: &mut Effects) -> Result<Option<u32>, HostError> {
        let debuggee = self.debuggee.as_mut().ok_or_else(not_paused)?;
        let paused = debuggee.paused.take().ok_or_else(not_paused)?;
        let session_id = debuggee.session.id.clone();

        if paused.exception.is_some() {
            // Resuming an unhandled exception lets it propagate
            self.exit(Some(1), effects);
            return Ok(None);
        }
        effects.message(
            &session_id,
            ProtocolMessage::Continued(ContinuedBody {
                thread_id: MAIN_THREAD,
                all_threads_continued: true,
            }),
        );
        Ok(Some(paused.position.line))
    }

    fn handle(
        &mut self,
        session: &Session,
        command: &str,
        arguments: &Value,
        options: &FakeOptions,
        effects: &mut Effects,
    ) -> Result<Value, HostError> {
        if !self
            .debuggee
            .as_ref()
            .is_some_and(|d| d.session.id == session.id)
        {
            return Err(HostError::new(format!("session {} is not running", session.id)));
        }

        match command {
            "threads" => {
                if self.thread_failures_left > 0 {
                    self.thread_failures_left -= 1;
                    return Err(HostError::new("threads are not available yet"));
                }
                Ok(json!({ "threads": [{ "id": MAIN_THREAD, "name": "MainThread" }] }))
            }
            "stackTrace" => self.stack_trace(),
            "exceptionInfo" => {
                let info = self
                    .debuggee
                    .as_ref()
                    .and_then(|d| d.paused.as_ref())
                    .and_then(|p| p.exception.clone())
                    .ok_or_else(|| HostError::new("no exception is being reported"))?;
                serde_json::to_value(info).map_err(|err| HostError::new(err.to_string()))
            }
            "continue" | "stepOut" => {
                if let Some(line) = self.unpause(effects)? {
                    self.run_from(line, false, options, effects);
                }
                Ok(json!({ "allThreadsContinued": true }))
            }
            "next" | "stepIn" => {
                let Some(line) = self.unpause(effects)? else {
                    return Ok(Value::Null);
                };
                let line_count = self
                    .debuggee
                    .as_ref()
                    .map(|d| d.program.line_count)
                    .unwrap_or(0);
                if let Some(info) = self.execute(line, effects) {
                    self.pause(line, "exception", Some(info), options, effects);
                } else if line >= line_count {
                    self.exit(Some(0), effects);
                } else {
                    self.pause(line + 1, "step", None, options, effects);
                }
                Ok(Value::Null)
            }
            "gotoTargets" => {
                let path = arguments["source"]["path"].as_str().map(PathBuf::from);
                let line = arguments["line"].as_u64().unwrap_or(0) as u32;
                let targets = match (path, self.debuggee.as_ref()) {
                    (Some(path), Some(debuggee))
                        if normalize_path(&path) == debuggee.program.path
                            && (1..=debuggee.program.line_count).contains(&line) =>
                    {
                        json!([{ "id": line, "label": format!("line {}", line), "line": line }])
                    }
                    _ => json!([]),
                };
                Ok(json!({ "targets": targets }))
            }
            "goto" => {
                let line = arguments["targetId"]
                    .as_u64()
                    .ok_or_else(|| HostError::new("goto needs a targetId"))?
                    as u32;
                let paused = self
                    .debuggee
                    .as_ref()
                    .is_some_and(|d| d.paused.is_some());
                if !paused {
                    return Err(not_paused());
                }
                self.pause(line, "goto", None, options, effects);
                Ok(Value::Null)
            }
            other => Err(HostError::new(format!("unsupported request: {}", other))),
        }
    }

    fn stack_trace(&mut self) -> Result<Value, HostError> {
        let debuggee = self.debuggee.as_mut().ok_or_else(not_paused)?;
        let paused = debuggee.paused.as_mut().ok_or_else(not_paused)?;

        let position = match paused.previous {
            Some(previous) if paused.stale_reads > 0 => {
                paused.stale_reads -= 1;
                previous
            }
            _ => paused.position,
        };
        let path = &debuggee.program.path;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());

        Ok(json!({
            "stackFrames": [{
                "id": position.frame_id,
                "name": "<module>",
                "source": { "name": name, "path": path },
                "line": position.line,
                "column": 1
            }],
            "totalFrames": 1
        }))
    }
}

/// Scripted host; see the module docs
pub struct FakeHost {
    state: Mutex<FakeState>,
    options: FakeOptions,
    events: mpsc::UnboundedSender<HostEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>,
    terminal: Option<Arc<BufferedTerminalCapture>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        Self::with_options(FakeOptions::default())
    }

    pub fn with_options(options: FakeOptions) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        let state = FakeState {
            thread_failures_left: options.thread_failures,
            ..FakeState::default()
        };
        Self {
            state: Mutex::new(state),
            options,
            events,
            receiver: Mutex::new(Some(receiver)),
            terminal: None,
        }
    }

    pub fn with_program(self, program: FakeProgram) -> Self {
        self.add_program(program);
        self
    }

    /// Feed debuggee output into `terminal` as the integrated terminal would
    pub fn with_terminal(mut self, terminal: Arc<BufferedTerminalCapture>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn add_program(&self, mut program: FakeProgram) {
        let key = normalize_path(&program.path);
        program.path = key.clone();
        self.lock().programs.insert(key, program);
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deliver(&self, effects: Effects) {
        if let Some(terminal) = &self.terminal {
            for (session_id, chunk) in effects.terminal {
                terminal.push(&session_id, chunk);
            }
        }
        for event in effects.events {
            // Receiver gone means the debugger was dropped
            let _ = self.events.send(event);
        }
    }

    // --- inspection ---

    /// Every configuration passed to `start_debugging`
    pub fn launched(&self) -> Vec<LaunchConfiguration> {
        self.lock().launched.clone()
    }

    /// Commands of every protocol request received, in order
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self, command: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    /// All stored breakpoints, including ones not yet visible
    pub fn stored_breakpoints(&self) -> Vec<HostBreakpoint> {
        self.lock()
            .breakpoints
            .iter()
            .map(|s| s.breakpoint.clone())
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.lock().debuggee.is_some()
    }

    /// Line the debuggee is paused on
    pub fn paused_line(&self) -> Option<u32> {
        self.lock()
            .debuggee
            .as_ref()
            .and_then(|d| d.paused.as_ref())
            .map(|p| p.position.line)
    }

    // --- scenario control ---

    /// Kill the running debuggee as if it ended outside the debugger
    pub fn kill(&self) -> bool {
        let mut effects = Effects::default();
        let killed = {
            let mut state = self.lock();
            let running = state.debuggee.is_some();
            state.exit(None, &mut effects);
            running
        };
        self.deliver(effects);
        killed
    }

    /// Emit adapter output for the running session
    pub fn emit_output(&self, category: &str, text: impl Into<String>) {
        let mut effects = Effects::default();
        {
            let state = self.lock();
            if let Some(debuggee) = &state.debuggee {
                effects.output(&debuggee.session.id, category, text.into());
            }
        }
        self.deliver(effects);
    }
}

#[async_trait]
impl DebugHost for FakeHost {
    async fn start_debugging(&self, configuration: &LaunchConfiguration) -> Result<bool, HostError> {
        let session = {
            let mut state = self.lock();
            state.launched.push(configuration.clone());
            if self.options.refuse_start {
                return Ok(false);
            }
            if state.debuggee.is_some() {
                return Err(HostError::new("a debug session is already running"));
            }

            // Module launches (pytest) name the file in their arguments
            let program_path = configuration
                .program
                .clone()
                .or_else(|| {
                    configuration
                        .args
                        .iter()
                        .map(PathBuf::from)
                        .find(|arg| state.programs.contains_key(&normalize_path(arg)))
                })
                .ok_or_else(|| HostError::new("configuration names no program"))?;
            let program = state
                .programs
                .get(&normalize_path(&program_path))
                .cloned()
                .ok_or_else(|| {
                    HostError::new(format!("no such program: {}", program_path.display()))
                })?;

            state.next_session += 1;
            let id = if self.options.reuse_session_id {
                "fake-session".to_string()
            } else {
                format!("fake-session-{}", state.next_session)
            };
            let session = Session::new(id, configuration.kind.clone(), configuration.name.clone());
            state.debuggee = Some(Debuggee {
                session: session.clone(),
                program,
                paused: None,
                last_position: None,
            });
            session
        };
        tracing::debug!(session = %session.id, name = %session.name, "fake session started");

        let mut effects = Effects::default();
        effects.events.push(HostEvent::SessionStarted(session.clone()));
        if self.terminal.is_some() {
            effects.events.push(HostEvent::TerminalOpened {
                session_id: Some(session.id.clone()),
                terminal: TerminalHandle::new(format!("fake-terminal-{}", session.id)),
            });
        }
        {
            let mut state = self.lock();
            let telemetry = state
                .debuggee
                .as_ref()
                .map(|d| d.program.telemetry.clone())
                .unwrap_or_default();
            for text in telemetry {
                effects.output(&session.id, "telemetry", text);
            }
            if configuration.stop_on_entry {
                state.pause(1, "entry", None, &self.options, &mut effects);
            } else {
                state.run_from(1, true, &self.options, &mut effects);
            }
        }
        self.deliver(effects);
        Ok(true)
    }

    async fn stop_debugging(&self, session: &Session) -> Result<(), HostError> {
        let mut effects = Effects::default();
        {
            let mut state = self.lock();
            if state
                .debuggee
                .as_ref()
                .is_some_and(|d| d.session.id == session.id)
            {
                state.exit(None, &mut effects);
            }
        }
        self.deliver(effects);
        Ok(())
    }

    fn active_debug_session(&self) -> Option<Session> {
        self.lock().debuggee.as_ref().map(|d| d.session.clone())
    }

    async fn send_request(
        &self,
        session: &Session,
        command: &str,
        arguments: Value,
    ) -> Result<Value, HostError> {
        let mut effects = Effects::default();
        let response = {
            let mut state = self.lock();
            state.requests.push(command.to_string());
            if self.options.failing_requests.contains(command) {
                return Err(HostError::new(format!("{} failed", command)));
            }
            state.handle(session, command, &arguments, &self.options, &mut effects)
        };
        self.deliver(effects);
        response
    }

    fn breakpoints(&self) -> Vec<HostBreakpoint> {
        let now = Instant::now();
        self.lock()
            .breakpoints
            .iter()
            .filter(|s| s.visible_at <= now)
            .map(|s| s.breakpoint.clone())
            .collect()
    }

    async fn add_breakpoints(&self, breakpoints: Vec<HostBreakpoint>) -> Result<(), HostError> {
        let visible_at = Instant::now() + self.options.breakpoint_visibility_delay;
        let mut state = self.lock();
        state
            .breakpoints
            .extend(breakpoints.into_iter().map(|breakpoint| StoredBreakpoint {
                breakpoint,
                visible_at,
                hits: 0,
            }));
        Ok(())
    }

    async fn remove_breakpoints(&self, breakpoints: Vec<HostBreakpoint>) -> Result<(), HostError> {
        let mut state = self.lock();
        for removed in &breakpoints {
            let path = normalize_path(&removed.path);
            state
                .breakpoints
                .retain(|s| !FakeState::same_location(&s.breakpoint, &path, removed.line));
        }
        Ok(())
    }

    fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<HostEvent>> {
        self.receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}
