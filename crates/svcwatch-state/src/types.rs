//! Persisted per-service runtime state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum number of restart timestamps kept per service.
pub const LEDGER_CAPACITY: usize = 100;

/// Durable record for one managed service.
///
/// Created with default (zero/empty) values the first time a service is
/// observed and kept across cycles indefinitely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceRuntimeState {
    /// Consecutive failed health probes since the last success or restart.
    #[serde(default)]
    pub health_failure_count: u32,
    /// Unix timestamps (seconds) of admitted restarts, oldest first.
    #[serde(default)]
    pub restart_ledger: Vec<u64>,
    /// While `now` is before this timestamp every restart is suppressed.
    #[serde(default)]
    pub cooldown_until: Option<u64>,
    /// Last observed instance identifier per dependency name.
    #[serde(default)]
    pub dependency_instance_ids: BTreeMap<String, String>,
}

impl ServiceRuntimeState {
    /// Append a restart at `now`, keeping only the newest
    /// [`LEDGER_CAPACITY`] entries.
    ///
    /// A timestamp older than the newest entry (clock stepped backwards)
    /// is clamped so the ledger stays non-decreasing.
    pub fn record_restart(&mut self, now: u64) {
        let ts = self
            .restart_ledger
            .last()
            .map_or(now, |&newest| now.max(newest));
        self.restart_ledger.push(ts);

        if self.restart_ledger.len() > LEDGER_CAPACITY {
            let excess = self.restart_ledger.len() - LEDGER_CAPACITY;
            self.restart_ledger.drain(..excess);
        }
    }

    /// Number of ledger entries at or after `since`.
    pub fn restarts_since(&self, since: u64) -> usize {
        self.restart_ledger.iter().filter(|&&ts| ts >= since).count()
    }

    /// Whether a cooldown is set and still running at `now`.
    pub fn in_cooldown(&self, now: u64) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Cumulative restarts as far as the capped ledger remembers.
    pub fn restarts_total(&self) -> u64 {
        self.restart_ledger.len() as u64
    }
}
