//! Shared per-core state.
//!
//! One [`DebugContext`] is owned by the facade and handed to every component
//! by `Arc`. It holds the authoritative active-session pointer, one stop slot
//! per session and the fan-out event channel. Locks are never held across an
//! await point; state is cleared at session start, quit and termination.

use dapflow_core::LocationKey;
use dapflow_types::{LaunchParams, Session, SessionId, StopEvent};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Terminated sessions whose state is kept before the oldest is dropped
pub const RETAINED_SESSIONS: usize = 16;

/// Latest-wins value of a session's stop slot
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    Idle,
    Stopped(StopEvent),
    Terminated,
}

/// Events fanned out to external observers
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    SessionStarted(Session),
    Stopped(StopEvent),
    SessionTerminated(SessionId),
}

/// Result of waiting on a session's stop slot
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Stopped(StopEvent),
    Terminated,
    TimedOut,
}

struct SessionSlot {
    session: Session,
    generation: u64,
    signal: watch::Sender<SessionSignal>,
    last_stop: Option<StopEvent>,
    last_thread: Option<i64>,
    navigation: Arc<tokio::sync::Mutex<()>>,
}

impl SessionSlot {
    fn new(session: Session, generation: u64) -> Self {
        let (signal, _) = watch::channel(SessionSignal::Idle);
        Self {
            session,
            generation,
            signal,
            last_stop: None,
            last_thread: None,
            navigation: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

pub struct DebugContext {
    active: Mutex<Option<Session>>,
    latest: Mutex<Option<Session>>,
    generation: AtomicU64,
    slots: Mutex<HashMap<SessionId, SessionSlot>>,
    /// Terminated slots, oldest first, tagged with their generation
    terminated: Mutex<VecDeque<(SessionId, u64)>>,
    temporary: Mutex<HashSet<LocationKey>>,
    launch_snapshot: Mutex<Option<LaunchParams>>,
    events: broadcast::Sender<DebugEvent>,
    seq: AtomicU64,
}

impl Default for DebugContext {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DebugContext {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            active: Mutex::new(None),
            latest: Mutex::new(None),
            generation: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
            terminated: Mutex::new(VecDeque::new()),
            temporary: Mutex::new(HashSet::new()),
            launch_snapshot: Mutex::new(None),
            events,
            seq: AtomicU64::new(0),
        }
    }

    // --- active session ---

    pub fn active_session(&self) -> Option<Session> {
        lock(&self.active).clone()
    }

    /// Number of sessions that have started; lets launch detect a new
    /// session even when the host reuses an id
    pub fn session_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Anchor a freshly started session: new stop slot, active pointer moved
    pub fn begin_session(&self, session: Session) {
        // Sessions are only begun from the tracker task; the counter moves
        // last so a launcher that sees it also sees the session
        let generation = self.generation.load(Ordering::SeqCst) + 1;
        lock(&self.slots).insert(
            session.id.clone(),
            SessionSlot::new(session.clone(), generation),
        );
        *lock(&self.active) = Some(session.clone());
        *lock(&self.latest) = Some(session.clone());
        self.generation.store(generation, Ordering::SeqCst);
        self.publish(DebugEvent::SessionStarted(session));
    }

    /// Most recently started session, even if it already terminated
    pub fn latest_session(&self) -> Option<Session> {
        lock(&self.latest).clone()
    }

    pub fn take_active(&self) -> Option<Session> {
        lock(&self.active).take()
    }

    /// Clear the active pointer only if it still names `session_id`
    pub fn clear_active_if(&self, session_id: &SessionId) -> bool {
        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|s| &s.id == session_id) {
            *active = None;
            return true;
        }
        false
    }

    /// The active session, required to be `session_id` when one is given
    pub fn require_active(&self, session_id: Option<&SessionId>) -> crate::Result<Session> {
        let active = self.active_session().ok_or(crate::Error::NoActiveSession)?;
        match session_id {
            Some(id) if id != &active.id => Err(crate::Error::InactiveSession(id.clone())),
            _ => Ok(active),
        }
    }

    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        lock(&self.slots).get(session_id).map(|slot| slot.session.clone())
    }

    // --- stop slot ---

    /// Receiver on the session's stop slot; the current value counts as seen
    pub fn subscribe(&self, session_id: &SessionId) -> Option<watch::Receiver<SessionSignal>> {
        lock(&self.slots)
            .get(session_id)
            .map(|slot| slot.signal.subscribe())
    }

    pub fn current_signal(&self, session_id: &SessionId) -> Option<SessionSignal> {
        lock(&self.slots)
            .get(session_id)
            .map(|slot| slot.signal.borrow().clone())
    }

    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store as last known stop (last-stop-wins) and wake waiters
    pub fn record_stop(&self, event: StopEvent) {
        {
            let mut slots = lock(&self.slots);
            let Some(slot) = slots.get_mut(&event.session_id) else {
                tracing::debug!(session = %event.session_id, "stop for unknown session ignored");
                return;
            };
            if event.thread_id.is_some() {
                slot.last_thread = event.thread_id;
            }
            slot.last_stop = Some(event.clone());
            slot.signal.send_replace(SessionSignal::Stopped(event.clone()));
        }
        self.publish(DebugEvent::Stopped(event));
    }

    /// Consume the last known stop; a second read without a new stop is `None`
    pub fn take_last_stop(&self, session_id: &SessionId) -> Option<StopEvent> {
        lock(&self.slots)
            .get_mut(session_id)
            .and_then(|slot| slot.last_stop.take())
    }

    pub fn clear_last_stop(&self, session_id: &SessionId) {
        self.take_last_stop(session_id);
    }

    /// Thread of the most recent stop, kept after the stop itself is consumed
    pub fn last_thread(&self, session_id: &SessionId) -> Option<i64> {
        lock(&self.slots)
            .get(session_id)
            .and_then(|slot| slot.last_thread)
    }

    pub fn mark_terminated(&self, session_id: &SessionId) {
        let generation = {
            let mut slots = lock(&self.slots);
            slots.get_mut(session_id).map(|slot| {
                slot.last_stop = None;
                slot.signal.send_replace(SessionSignal::Terminated);
                slot.generation
            })
        };
        if let Some(generation) = generation {
            self.retire(session_id, generation);
        }
        self.publish(DebugEvent::SessionTerminated(session_id.clone()));
    }

    /// Queue a terminated slot and drop the oldest beyond [`RETAINED_SESSIONS`].
    ///
    /// A queued id that was started again since keeps its newer slot.
    fn retire(&self, session_id: &SessionId, generation: u64) {
        let mut terminated = lock(&self.terminated);
        if terminated.contains(&(session_id.clone(), generation)) {
            return;
        }
        terminated.push_back((session_id.clone(), generation));
        if terminated.len() <= RETAINED_SESSIONS {
            return;
        }

        let mut slots = lock(&self.slots);
        while terminated.len() > RETAINED_SESSIONS {
            let Some((old_id, old_generation)) = terminated.pop_front() else {
                break;
            };
            if slots
                .get(&old_id)
                .is_some_and(|slot| slot.generation == old_generation)
            {
                slots.remove(&old_id);
                tracing::debug!(session = %old_id, "dropped state of terminated session");
            }
        }
    }

    /// Number of sessions that still hold a stop slot
    pub fn tracked_sessions(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn navigation_lock(&self, session_id: &SessionId) -> Option<Arc<tokio::sync::Mutex<()>>> {
        lock(&self.slots)
            .get(session_id)
            .map(|slot| slot.navigation.clone())
    }

    // --- temporary breakpoints ---

    pub fn register_temporary(&self, key: LocationKey) {
        lock(&self.temporary).insert(key);
    }

    pub fn unregister_temporary(&self, key: &LocationKey) -> bool {
        lock(&self.temporary).remove(key)
    }

    pub fn is_temporary(&self, key: &LocationKey) -> bool {
        lock(&self.temporary).contains(key)
    }

    pub fn has_temporary(&self) -> bool {
        !lock(&self.temporary).is_empty()
    }

    // --- launch snapshot ---

    pub fn store_launch_snapshot(&self, params: LaunchParams) {
        *lock(&self.launch_snapshot) = Some(params);
    }

    pub fn launch_snapshot(&self) -> Option<LaunchParams> {
        lock(&self.launch_snapshot).clone()
    }

    // --- fan-out ---

    pub fn subscribe_events(&self) -> broadcast::Receiver<DebugEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: DebugEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

/// Wait for the next stop or termination on a stop slot.
///
/// With `accept_current`, a non-idle value already in the slot is returned
/// immediately; launch needs this because the first stop can land before
/// the launcher subscribes. A dropped sender means the session id was
/// re-anchored by a new session and counts as termination.
pub async fn wait_for_signal(
    rx: &mut watch::Receiver<SessionSignal>,
    timeout: Duration,
    accept_current: bool,
) -> WaitOutcome {
    if accept_current {
        match rx.borrow_and_update().clone() {
            SessionSignal::Stopped(event) => return WaitOutcome::Stopped(event),
            SessionSignal::Terminated => return WaitOutcome::Terminated,
            SessionSignal::Idle => {}
        }
    }

    let wait = async {
        loop {
            if rx.changed().await.is_err() {
                return WaitOutcome::Terminated;
            }
            match rx.borrow_and_update().clone() {
                SessionSignal::Stopped(event) => return WaitOutcome::Stopped(event),
                SessionSignal::Terminated => return WaitOutcome::Terminated,
                SessionSignal::Idle => continue,
            }
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .unwrap_or(WaitOutcome::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dapflow_types::StopReason;

    fn session(id: &str) -> Session {
        Session::new(id, "debugpy", "test")
    }

    fn stop(ctx: &DebugContext, id: &str, reason: StopReason) -> StopEvent {
        StopEvent {
            seq: ctx.next_seq(),
            session_id: SessionId::new(id),
            reason,
            thread_id: Some(1),
            description: None,
            exception: None,
            captured_console_output: None,
            captured_raw_output: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_last_stop_is_consumed_once() {
        let ctx = DebugContext::new();
        ctx.begin_session(session("s1"));
        let id = SessionId::new("s1");

        let event = stop(&ctx, "s1", StopReason::Breakpoint);
        ctx.record_stop(event.clone());

        assert_eq!(ctx.take_last_stop(&id), Some(event));
        assert_eq!(ctx.take_last_stop(&id), None);
        assert_eq!(ctx.last_thread(&id), Some(1));
    }

    #[test]
    fn test_last_stop_wins() {
        let ctx = DebugContext::new();
        ctx.begin_session(session("s1"));
        let id = SessionId::new("s1");

        ctx.record_stop(stop(&ctx, "s1", StopReason::Step));
        let second = stop(&ctx, "s1", StopReason::Exception);
        ctx.record_stop(second.clone());

        assert_eq!(ctx.take_last_stop(&id), Some(second));
    }

    #[test]
    fn test_last_stop_is_scoped_per_session() {
        let ctx = DebugContext::new();
        ctx.begin_session(session("s1"));
        ctx.begin_session(session("s2"));

        ctx.record_stop(stop(&ctx, "s1", StopReason::Breakpoint));

        assert!(ctx.take_last_stop(&SessionId::new("s2")).is_none());
        assert!(ctx.take_last_stop(&SessionId::new("s1")).is_some());
    }

    #[test]
    fn test_require_active_rejects_other_session() {
        let ctx = DebugContext::new();
        assert!(matches!(
            ctx.require_active(None),
            Err(crate::Error::NoActiveSession)
        ));

        ctx.begin_session(session("s1"));
        assert!(ctx.require_active(Some(&SessionId::new("s1"))).is_ok());
        assert!(matches!(
            ctx.require_active(Some(&SessionId::new("other"))),
            Err(crate::Error::InactiveSession(_))
        ));
    }

    #[test]
    fn test_clear_active_only_for_matching_session() {
        let ctx = DebugContext::new();
        ctx.begin_session(session("s2"));

        assert!(!ctx.clear_active_if(&SessionId::new("s1")));
        assert!(ctx.active_session().is_some());
        assert!(ctx.clear_active_if(&SessionId::new("s2")));
        assert!(ctx.active_session().is_none());
    }

    #[tokio::test]
    async fn test_wait_sees_stop_recorded_after_subscribe() {
        let ctx = Arc::new(DebugContext::new());
        ctx.begin_session(session("s1"));
        let id = SessionId::new("s1");
        let mut rx = ctx.subscribe(&id).unwrap();

        let writer = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let event = stop(&writer, "s1", StopReason::Step);
            writer.record_stop(event);
        });

        let outcome = wait_for_signal(&mut rx, Duration::from_secs(1), false).await;
        assert!(matches!(outcome, WaitOutcome::Stopped(e) if e.reason == StopReason::Step));
    }

    #[tokio::test]
    async fn test_wait_ignores_current_value_unless_asked() {
        let ctx = DebugContext::new();
        ctx.begin_session(session("s1"));
        let id = SessionId::new("s1");
        ctx.record_stop(stop(&ctx, "s1", StopReason::Entry));

        let mut rx = ctx.subscribe(&id).unwrap();
        let outcome = wait_for_signal(&mut rx, Duration::from_millis(20), false).await;
        assert_eq!(outcome, WaitOutcome::TimedOut);

        let mut rx = ctx.subscribe(&id).unwrap();
        let outcome = wait_for_signal(&mut rx, Duration::from_millis(20), true).await;
        assert!(matches!(outcome, WaitOutcome::Stopped(e) if e.reason == StopReason::Entry));
    }

    #[tokio::test]
    async fn test_reanchored_session_wakes_old_waiters() {
        let ctx = DebugContext::new();
        ctx.begin_session(session("s1"));
        let id = SessionId::new("s1");
        let mut rx = ctx.subscribe(&id).unwrap();

        ctx.begin_session(session("s1"));

        let outcome = wait_for_signal(&mut rx, Duration::from_secs(1), false).await;
        assert_eq!(outcome, WaitOutcome::Terminated);
    }

    #[tokio::test]
    async fn test_termination_clears_last_stop_and_signals() {
        let ctx = DebugContext::new();
        ctx.begin_session(session("s1"));
        let id = SessionId::new("s1");
        let mut events = ctx.subscribe_events();
        ctx.record_stop(stop(&ctx, "s1", StopReason::Step));

        ctx.mark_terminated(&id);

        assert!(ctx.take_last_stop(&id).is_none());
        assert_eq!(ctx.current_signal(&id), Some(SessionSignal::Terminated));
        assert!(matches!(events.recv().await, Ok(DebugEvent::Stopped(_))));
        assert!(matches!(
            events.recv().await,
            Ok(DebugEvent::SessionTerminated(t)) if t == id
        ));
    }

    #[test]
    fn test_only_recent_terminated_sessions_keep_slots() {
        let ctx = DebugContext::new();
        for n in 0..=RETAINED_SESSIONS {
            let id = format!("s{n}");
            ctx.begin_session(session(&id));
            ctx.mark_terminated(&SessionId::new(id));
        }

        assert_eq!(ctx.tracked_sessions(), RETAINED_SESSIONS);
        assert!(ctx.session(&SessionId::new("s0")).is_none());
        assert_eq!(
            ctx.current_signal(&SessionId::new("s1")),
            Some(SessionSignal::Terminated)
        );
    }

    #[test]
    fn test_restarted_id_keeps_its_live_slot() {
        let ctx = DebugContext::new();
        let reused = SessionId::new("reused");
        ctx.begin_session(session("reused"));
        ctx.mark_terminated(&reused);
        ctx.begin_session(session("reused"));

        for n in 0..RETAINED_SESSIONS {
            let id = format!("s{n}");
            ctx.begin_session(session(&id));
            ctx.mark_terminated(&SessionId::new(id));
        }

        assert_eq!(ctx.current_signal(&reused), Some(SessionSignal::Idle));
        assert!(ctx.navigation_lock(&reused).is_some());
    }
}
