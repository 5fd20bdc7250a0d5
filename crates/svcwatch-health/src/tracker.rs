//! Consecutive-failure bookkeeping over a persisted counter.

use tracing::{debug, warn};

use crate::checker::ProbeResult;

/// What a probe result means for the restart decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Probe passed; the counter was reset.
    Healthy,
    /// Probe failed but the threshold has not been reached.
    Failing { failures: u32 },
    /// The threshold was reached; a restart is wanted and the counter
    /// has been reset.
    ThresholdReached { failures: u32 },
}

impl HealthVerdict {
    pub fn wants_restart(self) -> bool {
        matches!(self, HealthVerdict::ThresholdReached { .. })
    }
}

/// Record a probe result against `failure_count` and return the verdict.
///
/// `Unhealthy` and `Failed` both count as failures.
pub fn record_probe(failure_count: &mut u32, result: ProbeResult, threshold: u32) -> HealthVerdict {
    match result {
        ProbeResult::Healthy => {
            if *failure_count > 0 {
                debug!(previous_failures = *failure_count, "health recovered");
            }
            *failure_count = 0;
            HealthVerdict::Healthy
        }
        ProbeResult::Unhealthy | ProbeResult::Failed => {
            *failure_count = failure_count.saturating_add(1);
            let failures = *failure_count;

            if failures >= threshold {
                warn!(failures, threshold, "health failure threshold reached");
                *failure_count = 0;
                HealthVerdict::ThresholdReached { failures }
            } else {
                debug!(failures, threshold, "health probe failed");
                HealthVerdict::Failing { failures }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_accumulate_below_threshold() {
        let mut count = 0;
        assert_eq!(
            record_probe(&mut count, ProbeResult::Unhealthy, 3),
            HealthVerdict::Failing { failures: 1 }
        );
        assert_eq!(
            record_probe(&mut count, ProbeResult::Failed, 3),
            HealthVerdict::Failing { failures: 2 }
        );
        assert_eq!(count, 2);
    }

    #[test]
    fn threshold_requests_restart_and_resets() {
        let mut count = 2;
        let verdict = record_probe(&mut count, ProbeResult::Unhealthy, 3);
        assert_eq!(verdict, HealthVerdict::ThresholdReached { failures: 3 });
        assert!(verdict.wants_restart());
        assert_eq!(count, 0);
    }

    #[test]
    fn single_success_resets_counter() {
        let mut count = 41;
        assert_eq!(
            record_probe(&mut count, ProbeResult::Healthy, 50),
            HealthVerdict::Healthy
        );
        assert_eq!(count, 0);
    }

    #[test]
    fn threshold_of_one_restarts_immediately() {
        let mut count = 0;
        assert!(record_probe(&mut count, ProbeResult::Failed, 1).wants_restart());
        assert_eq!(count, 0);
    }

    #[test]
    fn stale_counter_above_threshold_still_triggers() {
        // Threshold lowered in config since the counter was persisted.
        let mut count = 7;
        assert!(record_probe(&mut count, ProbeResult::Unhealthy, 3).wants_restart());
    }
}
