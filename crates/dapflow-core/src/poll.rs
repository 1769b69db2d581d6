//! The one retry loop every "wait until observable state changes" step uses.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Interval and overall budget of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// Repeatedly run `probe` until it yields a value or `policy.timeout` elapses.
///
/// The probe always runs at least once, and once more at the deadline, so a
/// zero timeout degenerates into a single read. Returns `None` on timeout.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        let remaining = deadline - now;
        tokio::time::sleep(policy.interval.min(remaining)).await;
    }
}
