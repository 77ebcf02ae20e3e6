//! One-shot blocked-agent alert tracking.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Agents already reported to the supervisor during the current blocked
/// episode.
///
/// An agent is alerted once per episode; its entry is dropped as soon as it
/// is seen unblocked, so a later block alerts again. The cache is owned by
/// the daemon and starts empty on every process start.
#[derive(Debug, Default)]
pub struct BlockedAlertCache {
    alerted: Mutex<HashSet<String>>,
}

impl BlockedAlertCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<String>> {
        // a poisoned set is still a valid set
        self.alerted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether `agent_id` has not been alerted yet in this episode.
    #[must_use]
    pub fn should_alert(&self, agent_id: &str) -> bool {
        !self.guard().contains(agent_id)
    }

    /// Record a sent alert. Returns `false` if one was already recorded.
    pub fn record(&self, agent_id: &str) -> bool {
        self.guard().insert(agent_id.to_owned())
    }

    /// Forget every agent not in `still_blocked`.
    pub fn retain_blocked<'a, I>(&self, still_blocked: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: HashSet<&str> = still_blocked.into_iter().collect();
        self.guard().retain(|id| keep.contains(id.as_str()));
    }

    /// Whether `agent_id` is currently recorded.
    #[must_use]
    pub fn contains(&self, agent_id: &str) -> bool {
        self.guard().contains(agent_id)
    }

    /// Number of recorded agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.guard().clear();
    }
}
