//! Per-cycle metrics accumulation.
//!
//! A [`CycleAccumulator`] is created when a cycle starts, passed through
//! every service evaluation, and consumed into a [`MetricsSnapshot`] once
//! all services are done.

use std::time::Instant;

use tracing::debug;

/// Metrics for one service at the end of its evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSample {
    pub service: String,
    /// Restart ledger length (cumulative, approximate past the ledger cap).
    pub restarts_total: u64,
    /// Persisted consecutive health-failure counter after this cycle.
    pub health_failures_total: u64,
    /// False if this cycle saw the service failed, inactive, or unhealthy.
    pub up: bool,
    /// The rate limiter suppressed a restart this cycle.
    pub rate_limited: bool,
    /// A restart command succeeded this cycle.
    pub restarted: bool,
}

/// Everything rendered at the end of a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Samples ordered by service name.
    pub services: Vec<ServiceSample>,
    /// Restart commands that succeeded this cycle.
    pub cycle_restarts: u64,
    pub cycle_duration_secs: f64,
    /// Unix time (seconds) the cycle started.
    pub timestamp: u64,
}

/// Running totals for the cycle in progress.
#[derive(Debug)]
pub struct CycleAccumulator {
    timestamp: u64,
    started: Instant,
    samples: Vec<ServiceSample>,
}

impl CycleAccumulator {
    /// Start accumulating for a cycle that began at `timestamp`.
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            started: Instant::now(),
            samples: Vec::new(),
        }
    }

    /// Add one service's sample.
    pub fn record(&mut self, sample: ServiceSample) {
        debug!(
            service = %sample.service,
            up = sample.up,
            rate_limited = sample.rate_limited,
            restarted = sample.restarted,
            "metrics sample recorded"
        );
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Merge the accumulated samples into one snapshot.
    pub fn finish(mut self) -> MetricsSnapshot {
        self.samples.sort_by(|a, b| a.service.cmp(&b.service));
        let cycle_restarts = self.samples.iter().filter(|s| s.restarted).count() as u64;
        MetricsSnapshot {
            services: self.samples,
            cycle_restarts,
            cycle_duration_secs: self.started.elapsed().as_secs_f64(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(service: &str, restarted: bool) -> ServiceSample {
        ServiceSample {
            service: service.to_string(),
            restarts_total: 1,
            health_failures_total: 0,
            up: true,
            rate_limited: false,
            restarted,
        }
    }

    #[test]
    fn empty_cycle() {
        let acc = CycleAccumulator::new(1000);
        assert!(acc.is_empty());
        let snap = acc.finish();
        assert!(snap.services.is_empty());
        assert_eq!(snap.cycle_restarts, 0);
        assert_eq!(snap.timestamp, 1000);
    }

    #[test]
    fn finish_sorts_and_counts_restarts() {
        let mut acc = CycleAccumulator::new(1000);
        acc.record(sample("web", true));
        acc.record(sample("api", false));
        acc.record(sample("db", true));
        assert_eq!(acc.len(), 3);

        let snap = acc.finish();
        let names: Vec<_> = snap.services.iter().map(|s| s.service.as_str()).collect();
        assert_eq!(names, vec!["api", "db", "web"]);
        assert_eq!(snap.cycle_restarts, 2);
        assert!(snap.cycle_duration_secs >= 0.0);
    }
}
