//! Per-session output capture.
//!
//! Two independent streams are kept per session: adapter console output
//! (fed by `output` protocol events) and raw terminal output (owned by a
//! [`RawOutputCapturer`]). Both finalize through the same quiescence poll,
//! because adapters keep emitting trailing output after the debuggee exits.

use crate::config::OutputConfig;
use crate::context::RETAINED_SESSIONS;
use async_trait::async_trait;
use dapflow_types::{SessionId, TerminalHandle};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How finalization decides a stream has stopped growing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuiescencePolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl From<&OutputConfig> for QuiescencePolicy {
    fn from(config: &OutputConfig) -> Self {
        Self {
            interval: config.quiescence_interval(),
            attempts: config.quiescence_attempts,
        }
    }
}

#[derive(Debug)]
struct SessionOutput {
    /// Distinguishes buffers of successive sessions that share an id
    epoch: u64,
    active: Vec<String>,
    finalized: Option<String>,
}

impl SessionOutput {
    fn active_len(&self) -> usize {
        self.active.iter().map(String::len).sum()
    }
}

/// Ordered chunk buffers for one output stream, keyed by session
#[derive(Debug, Default)]
pub struct OutputBuffers {
    sessions: Mutex<HashMap<SessionId, SessionOutput>>,
    epochs: AtomicU64,
}

impl OutputBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionOutput>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry<'a>(
        &self,
        sessions: &'a mut HashMap<SessionId, SessionOutput>,
        session_id: &SessionId,
    ) -> &'a mut SessionOutput {
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionOutput {
                epoch: self.epochs.fetch_add(1, Ordering::SeqCst),
                active: Vec::new(),
                finalized: None,
            })
    }

    pub fn append(&self, session_id: &SessionId, chunk: impl Into<String>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        let mut sessions = self.lock();
        self.entry(&mut sessions, session_id).active.push(chunk);
    }

    /// Buffered output not yet handed to a stop event or finalized
    pub fn active(&self, session_id: &SessionId) -> Option<String> {
        self.lock()
            .get(session_id)
            .filter(|output| !output.active.is_empty())
            .map(|output| output.active.concat())
    }

    /// Read and clear the active buffer
    pub fn take_active(&self, session_id: &SessionId) -> Option<String> {
        let mut sessions = self.lock();
        let output = sessions.get_mut(session_id)?;
        if output.active.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut output.active).concat())
    }

    pub fn finalized(&self, session_id: &SessionId) -> Option<String> {
        self.lock()
            .get(session_id)
            .and_then(|output| output.finalized.clone())
    }

    pub fn has_finalized(&self, session_id: &SessionId) -> bool {
        self.lock()
            .get(session_id)
            .is_some_and(|output| output.finalized.is_some())
    }

    pub fn active_len(&self, session_id: &SessionId) -> usize {
        self.lock()
            .get(session_id)
            .map(SessionOutput::active_len)
            .unwrap_or(0)
    }

    /// Drop both the active and the finalized output of a session
    pub fn reset(&self, session_id: &SessionId) {
        self.lock().remove(session_id);
    }

    /// Wait for the active buffer to stop growing, then move it to finalized.
    ///
    /// Sampling stops early once two consecutive samples are equal and
    /// non-zero. A second finalize with nothing new buffered keeps the
    /// earlier finalized text. Returns `None` when the session was reset
    /// while sampling; the buffers then belong to a newer session and are
    /// left alone.
    pub async fn finalize(
        &self,
        session_id: &SessionId,
        policy: QuiescencePolicy,
    ) -> Option<String> {
        let epoch = {
            let mut sessions = self.lock();
            self.entry(&mut sessions, session_id).epoch
        };
        let mut previous: Option<usize> = None;
        for _ in 0..policy.attempts {
            tokio::time::sleep(policy.interval).await;
            let len = self.active_len(session_id);
            if len > 0 && previous == Some(len) {
                break;
            }
            previous = Some(len);
        }

        let mut sessions = self.lock();
        let output = sessions
            .get_mut(session_id)
            .filter(|output| output.epoch == epoch)?;
        if output.active.is_empty()
            && let Some(existing) = &output.finalized
        {
            return Some(existing.clone());
        }
        let joined = std::mem::take(&mut output.active).concat();
        output.finalized = Some(joined.clone());
        Some(joined)
    }
}

/// Raw process/terminal output collaborator.
///
/// The terminal side starts capture when it attaches a debuggee terminal;
/// the core stops it (awaited) when the session terminates.
#[async_trait]
pub trait RawOutputCapturer: Send + Sync {
    async fn start_capture_for_session(&self, session_id: &SessionId, terminal: TerminalHandle);

    /// Stop capturing and finalize; implementations perform their own settle wait
    async fn stop_capture_for_session(&self, session_id: &SessionId);

    fn active_session_raw_output(&self, session_id: &SessionId) -> Option<String>;

    fn finalized_session_raw_output(&self, session_id: &SessionId) -> Option<String>;

    /// Read and clear the active raw output (ownership moves to a stop event)
    fn take_active_session_raw_output(&self, session_id: &SessionId) -> Option<String>;

    /// Forget everything captured for a session id
    fn reset_session_raw_output(&self, session_id: &SessionId);

    /// Release a finished session's output for good
    fn evict_session_raw_output(&self, session_id: &SessionId) {
        self.reset_session_raw_output(session_id);
    }
}

/// Raw capturer backed by [`OutputBuffers`]; the terminal collaborator
/// pushes chunks with [`BufferedTerminalCapture::push`].
#[derive(Debug)]
pub struct BufferedTerminalCapture {
    buffers: OutputBuffers,
    attached: Mutex<HashMap<SessionId, TerminalHandle>>,
    policy: QuiescencePolicy,
}

impl BufferedTerminalCapture {
    pub fn new(policy: QuiescencePolicy) -> Self {
        Self {
            buffers: OutputBuffers::new(),
            attached: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn attached(&self) -> MutexGuard<'_, HashMap<SessionId, TerminalHandle>> {
        self.attached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_capturing(&self, session_id: &SessionId) -> bool {
        self.attached().contains_key(session_id)
    }

    /// Record terminal output; dropped unless capture is running for the session
    pub fn push(&self, session_id: &SessionId, chunk: impl Into<String>) {
        if !self.is_capturing(session_id) {
            tracing::debug!(session = %session_id, "dropping raw output for session without capture");
            return;
        }
        self.buffers.append(session_id, chunk);
    }
}

#[async_trait]
impl RawOutputCapturer for BufferedTerminalCapture {
    async fn start_capture_for_session(&self, session_id: &SessionId, terminal: TerminalHandle) {
        tracing::debug!(session = %session_id, terminal = terminal.as_str(), "raw capture started");
        self.attached().insert(session_id.clone(), terminal);
    }

    async fn stop_capture_for_session(&self, session_id: &SessionId) {
        if !self.is_capturing(session_id) {
            return;
        }
        // Keep accepting chunks while the quiescence poll runs
        let Some(finalized) = self.buffers.finalize(session_id, self.policy).await else {
            tracing::debug!(session = %session_id, "raw capture was restarted, keeping it attached");
            return;
        };
        self.attached().remove(session_id);
        tracing::debug!(session = %session_id, bytes = finalized.len(), "raw capture finalized");
    }

    fn active_session_raw_output(&self, session_id: &SessionId) -> Option<String> {
        self.buffers.active(session_id)
    }

    fn finalized_session_raw_output(&self, session_id: &SessionId) -> Option<String> {
        self.buffers.finalized(session_id)
    }

    fn take_active_session_raw_output(&self, session_id: &SessionId) -> Option<String> {
        self.buffers.take_active(session_id)
    }

    fn reset_session_raw_output(&self, session_id: &SessionId) {
        self.buffers.reset(session_id);
    }

    fn evict_session_raw_output(&self, session_id: &SessionId) {
        self.buffers.reset(session_id);
        self.attached().remove(session_id);
    }
}

#[derive(Debug, Clone, Copy)]
struct Lifecycle {
    epoch: u64,
    /// Console and raw streams have both been finalized
    completed: bool,
}

#[derive(Debug, Default)]
struct Lifecycles {
    sessions: HashMap<SessionId, Lifecycle>,
    /// Completed sessions, oldest first, tagged with the epoch that completed
    finished: VecDeque<(SessionId, u64)>,
    next_epoch: u64,
}

impl Lifecycles {
    fn begin(&mut self, session_id: &SessionId) -> u64 {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.sessions.insert(
            session_id.clone(),
            Lifecycle {
                epoch,
                completed: false,
            },
        );
        epoch
    }

    fn current(&mut self, session_id: &SessionId) -> u64 {
        match self.sessions.get(session_id) {
            Some(lifecycle) => lifecycle.epoch,
            None => self.begin(session_id),
        }
    }
}

/// Both output streams of every session.
///
/// Only the last [`RETAINED_SESSIONS`] finished sessions keep their output;
/// older ones are evicted as new sessions complete.
pub struct OutputCaptureStore {
    console: OutputBuffers,
    raw: Arc<dyn RawOutputCapturer>,
    policy: QuiescencePolicy,
    lifecycles: Mutex<Lifecycles>,
}

impl OutputCaptureStore {
    pub fn new(raw: Arc<dyn RawOutputCapturer>, policy: QuiescencePolicy) -> Self {
        Self {
            console: OutputBuffers::new(),
            raw,
            policy,
            lifecycles: Mutex::new(Lifecycles::default()),
        }
    }

    pub fn console(&self) -> &OutputBuffers {
        &self.console
    }

    pub fn raw(&self) -> &Arc<dyn RawOutputCapturer> {
        &self.raw
    }

    pub fn append_console(&self, session_id: &SessionId, chunk: impl Into<String>) {
        self.console.append(session_id, chunk);
    }

    /// Active (console, raw) output without consuming it
    pub fn active_streams(&self, session_id: &SessionId) -> (Option<String>, Option<String>) {
        (
            self.console.active(session_id),
            self.raw.active_session_raw_output(session_id),
        )
    }

    /// Active (console, raw) output, cleared so the next stop does not see it again
    pub fn take_active_streams(&self, session_id: &SessionId) -> (Option<String>, Option<String>) {
        (
            self.console.take_active(session_id),
            self.raw.take_active_session_raw_output(session_id),
        )
    }

    pub fn finalized_streams(&self, session_id: &SessionId) -> (Option<String>, Option<String>) {
        (
            self.console.finalized(session_id),
            self.raw.finalized_session_raw_output(session_id),
        )
    }

    fn lifecycles(&self) -> MutexGuard<'_, Lifecycles> {
        self.lifecycles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether both streams of the session reached their final text
    pub fn has_finalized(&self, session_id: &SessionId) -> bool {
        self.lifecycles()
            .sessions
            .get(session_id)
            .is_some_and(|lifecycle| lifecycle.completed)
    }

    /// Start a clean output generation for a session id.
    ///
    /// Any finalization still running for an earlier session with the same
    /// id becomes stale and leaves the new buffers untouched. Returns whether
    /// the id had output state before.
    pub fn reset_session(&self, session_id: &SessionId) -> bool {
        let known = {
            let mut lifecycles = self.lifecycles();
            let known = lifecycles.sessions.contains_key(session_id);
            lifecycles.begin(session_id);
            known
        };
        self.console.reset(session_id);
        self.raw.reset_session_raw_output(session_id);
        known
    }

    /// Finalize both streams concurrently
    pub async fn finalize_session(&self, session_id: &SessionId) {
        let epoch = self.lifecycles().current(session_id);
        let (console, ()) = tokio::join!(
            self.console.finalize(session_id, self.policy),
            self.raw.stop_capture_for_session(session_id)
        );

        let evicted = {
            let mut lifecycles = self.lifecycles();
            match lifecycles.sessions.get_mut(session_id) {
                Some(lifecycle) if lifecycle.epoch == epoch && console.is_some() => {
                    lifecycle.completed = true;
                }
                _ => {
                    tracing::debug!(session = %session_id, "discarding finalization of a replaced session");
                    return;
                }
            }
            lifecycles.finished.push_back((session_id.clone(), epoch));
            let mut evicted = Vec::new();
            while lifecycles.finished.len() > RETAINED_SESSIONS {
                let Some((old_id, old_epoch)) = lifecycles.finished.pop_front() else {
                    break;
                };
                // An id reused since it finished belongs to a live session now
                if lifecycles
                    .sessions
                    .get(&old_id)
                    .is_some_and(|lifecycle| lifecycle.epoch == old_epoch)
                {
                    lifecycles.sessions.remove(&old_id);
                    evicted.push(old_id);
                }
            }
            evicted
        };
        for old_id in &evicted {
            self.console.reset(old_id);
            self.raw.evict_session_raw_output(old_id);
            tracing::debug!(session = %old_id, "evicted output of finished session");
        }

        let bytes = console.map(|text| text.len()).unwrap_or(0);
        tracing::debug!(session = %session_id, bytes, "console output finalized");
    }
}
