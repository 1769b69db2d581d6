//! Location-keyed breakpoint CRUD over the host's eventually consistent store.
//!
//! The host only offers add/remove and a read-back list that may lag, so
//! every mutation is remove + add followed by a read-back poll, and every
//! "edit" is an explicit [`BreakpointManager::replace`].

use crate::config::TimingConfig;
use crate::context::DebugContext;
use crate::host::DebugHost;
use crate::{Error, Result};
use dapflow_core::{LocationKey, PollPolicy, normalize_path, poll_until};
use dapflow_types::{Breakpoint, HostBreakpoint, Location};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A breakpoint submitted to the host and whether read-back confirmed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointOutcome {
    pub breakpoint: Breakpoint,
    pub verified: bool,
}

pub struct BreakpointManager {
    host: Arc<dyn DebugHost>,
    ctx: Arc<DebugContext>,
    timing: TimingConfig,
}

impl BreakpointManager {
    pub fn new(host: Arc<dyn DebugHost>, ctx: Arc<DebugContext>, timing: TimingConfig) -> Self {
        Self { host, ctx, timing }
    }

    fn find_now(&self, key: &LocationKey) -> Option<HostBreakpoint> {
        self.host
            .breakpoints()
            .into_iter()
            .find(|bp| &LocationKey::of_host(bp) == key)
    }

    async fn find(&self, key: &LocationKey, policy: PollPolicy) -> Option<HostBreakpoint> {
        poll_until(policy, move || async move { self.find_now(key) }).await
    }

    /// Poll the read-back list until `key` shows up. Warns on timeout.
    async fn confirm_present(&self, key: &LocationKey) -> bool {
        let policy = self.timing.poll_policy();
        let found = self.find(key, policy).await.is_some();
        if !found {
            tracing::warn!(
                location = %key,
                timeout_ms = policy.timeout.as_millis() as u64,
                "breakpoint not visible in host list yet; assuming it was added"
            );
        }
        found
    }

    fn to_domain(&self, host: &HostBreakpoint) -> Breakpoint {
        let temporary = self.ctx.is_temporary(&LocationKey::of_host(host));
        Breakpoint::from_host(host, temporary)
    }

    /// Add or overwrite the breakpoint at `breakpoint.location`.
    ///
    /// Never leaves two breakpoints on one location. Succeeds even when the
    /// read-back times out; `verified` reports whether it was confirmed.
    pub async fn set(&self, breakpoint: Breakpoint) -> Result<BreakpointOutcome> {
        validate_location(&breakpoint.location)?;
        let key = LocationKey::of_location(&breakpoint.location);

        if self.remove_by_location(&breakpoint.location).await? {
            tokio::time::sleep(self.timing.settle_delay()).await;
        }

        self.host.add_breakpoints(vec![breakpoint.to_host()]).await?;
        if breakpoint.temporary {
            self.ctx.register_temporary(key.clone());
        }
        let verified = self.confirm_present(&key).await;

        tracing::info!(location = %key, temporary = breakpoint.temporary, verified, "breakpoint set");
        Ok(BreakpointOutcome {
            breakpoint,
            verified,
        })
    }

    /// One-shot breakpoint, removed by the stop tracker once hit
    pub async fn set_temporary(&self, location: Location) -> Result<BreakpointOutcome> {
        self.set(Breakpoint::temporary(location)).await
    }

    /// Remove whatever breakpoint sits at `location`.
    ///
    /// Returns whether one was found. Absence is success; removal is not
    /// re-verified because hosts are slow to reflect it.
    pub async fn remove_by_location(&self, location: &Location) -> Result<bool> {
        validate_location(location)?;
        let key = LocationKey::of_location(location);

        let Some(existing) = self.find(&key, self.timing.lookup_policy()).await else {
            tracing::debug!(location = %key, "no breakpoint to remove");
            self.ctx.unregister_temporary(&key);
            return Ok(false);
        };

        self.host.remove_breakpoints(vec![existing]).await?;
        self.ctx.unregister_temporary(&key);
        tracing::info!(location = %key, "breakpoint removed");
        Ok(true)
    }

    /// Remove every breakpoint in `path`, returning how many were removed
    pub async fn remove_all_in_file(&self, path: &Path) -> Result<usize> {
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidInput("breakpoint path is empty".to_string()));
        }
        let target = normalize_path(path);
        let in_file: Vec<HostBreakpoint> = self
            .host
            .breakpoints()
            .into_iter()
            .filter(|bp| normalize_path(&bp.path) == target)
            .collect();

        if in_file.is_empty() {
            return Ok(0);
        }

        let count = in_file.len();
        for bp in &in_file {
            self.ctx.unregister_temporary(&LocationKey::of_host(bp));
        }
        self.host.remove_breakpoints(in_file).await?;
        tracing::info!(path = %target.display(), count, "breakpoints removed from file");
        Ok(count)
    }

    /// Replace the breakpoint at `location` with `next`.
    ///
    /// There is no partial update on the host: this is find → remove →
    /// settle → add → confirm, with a window in which neither exists.
    pub async fn replace(&self, location: &Location, next: Breakpoint) -> Result<BreakpointOutcome> {
        validate_location(location)?;
        validate_location(&next.location)?;
        let key = LocationKey::of_location(location);

        let existing = self
            .find(&key, self.timing.lookup_policy())
            .await
            .ok_or_else(|| Error::BreakpointNotFound(key.to_string()))?;

        self.host.remove_breakpoints(vec![existing]).await?;
        self.ctx.unregister_temporary(&key);
        tokio::time::sleep(self.timing.settle_delay()).await;

        let next_key = LocationKey::of_location(&next.location);
        self.host.add_breakpoints(vec![next.to_host()]).await?;
        if next.temporary {
            self.ctx.register_temporary(next_key.clone());
        }
        let verified = self.confirm_present(&next_key).await;

        Ok(BreakpointOutcome {
            breakpoint: next,
            verified,
        })
    }

    async fn modify<F>(&self, location: &Location, change: F) -> Result<BreakpointOutcome>
    where
        F: FnOnce(Breakpoint) -> Breakpoint,
    {
        validate_location(location)?;
        let key = LocationKey::of_location(location);
        let current = self
            .find(&key, self.timing.lookup_policy())
            .await
            .map(|host| self.to_domain(&host))
            .ok_or_else(|| Error::BreakpointNotFound(key.to_string()))?;

        self.replace(location, change(current)).await
    }

    pub async fn set_enabled(&self, location: &Location, enabled: bool) -> Result<BreakpointOutcome> {
        self.modify(location, |bp| bp.with_enabled(enabled)).await
    }

    pub async fn enable(&self, location: &Location) -> Result<BreakpointOutcome> {
        self.set_enabled(location, true).await
    }

    pub async fn disable(&self, location: &Location) -> Result<BreakpointOutcome> {
        self.set_enabled(location, false).await
    }

    pub async fn set_condition(
        &self,
        location: &Location,
        condition: Option<String>,
    ) -> Result<BreakpointOutcome> {
        let condition = condition.filter(|c| !c.trim().is_empty());
        self.modify(location, |bp| bp.with_condition(condition)).await
    }

    /// Skip the next `count` hits; zero clears the hit condition
    pub async fn set_ignore_count(&self, location: &Location, count: u32) -> Result<BreakpointOutcome> {
        let hit_condition = (count > 0).then(|| format!(">{}", count));
        self.modify(location, |bp| bp.with_hit_condition(hit_condition))
            .await
    }

    /// Current breakpoints, optionally waiting for one location to appear.
    ///
    /// Never fails: a location that does not show up within the timeout is
    /// logged and the list as currently known is returned.
    pub async fn active(&self, wait_for: Option<&Location>, timeout: Option<Duration>) -> Vec<Breakpoint> {
        if let Some(location) = wait_for {
            let key = LocationKey::of_location(location);
            let mut policy = self.timing.poll_policy();
            if let Some(timeout) = timeout {
                policy = policy.with_timeout(timeout);
            }
            if self.find(&key, policy).await.is_none() {
                tracing::warn!(location = %key, "breakpoint did not appear before timeout");
            }
        }

        self.host
            .breakpoints()
            .iter()
            .map(|bp| self.to_domain(bp))
            .collect()
    }

    /// The breakpoint at `location`, if the host currently lists one
    pub fn get(&self, location: &Location) -> Option<Breakpoint> {
        self.find_now(&LocationKey::of_location(location))
            .map(|host| self.to_domain(&host))
    }
}

fn validate_location(location: &Location) -> Result<()> {
    if location.path.as_os_str().is_empty() {
        return Err(Error::InvalidInput("breakpoint path is empty".to_string()));
    }
    if location.line == 0 {
        return Err(Error::InvalidInput(
            "breakpoint lines are one-based; got 0".to_string(),
        ));
    }
    Ok(())
}
