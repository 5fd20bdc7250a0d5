//! The watch cycle: one sequential pass over every enabled service.
//!
//! Disabled services are not evaluated, but their persisted counters are
//! still reported so their metric series do not vanish.

use std::sync::Arc;

use tracing::{error, info, warn};

use svcwatch_core::{ServiceSpec, WatchConfig};
use svcwatch_health::{NetProber, Prober, record_probe};
use svcwatch_metrics::{
    CycleAccumulator, MetricsSnapshot, ServiceSample, SinkError, emit, render_prometheus,
};
use svcwatch_state::{RuntimeStore, ServiceRuntimeState, StateError};

use crate::decision::{RestartReason, decide, health_check_to_run};
use crate::dependency::check_dependencies;
use crate::process::{ProcessManager, UnitState};
use crate::rate_limit::{Admission, admit};

/// What happened to one service during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub service: String,
    pub observed: UnitState,
    /// Probe result, if a probe ran.
    pub healthy: Option<bool>,
    /// The restart reason chosen, suppressed or not.
    pub reason: Option<RestartReason>,
    /// A requested restart was suppressed by the rate limiter.
    pub rate_limited: bool,
    /// A restart command was issued and succeeded.
    pub restarted: bool,
    /// A restart command was issued and failed.
    pub restart_failed: bool,
}

impl CycleOutcome {
    /// False if the service was seen failed, inactive, or unhealthy.
    pub fn up(&self) -> bool {
        !matches!(self.observed, UnitState::Failed | UnitState::Inactive)
            && self.healthy != Some(false)
    }
}

/// Everything a cycle produced.
#[derive(Debug)]
pub struct CycleReport {
    /// Outcomes for services whose state could be loaded, in name order.
    pub outcomes: Vec<CycleOutcome>,
    /// Services skipped, left unsaved or left out of the metrics because
    /// the state store failed.
    pub errors: Vec<(String, StateError)>,
    pub snapshot: MetricsSnapshot,
    /// The rendered exposition body handed to the sinks.
    pub metrics_body: String,
    pub sink_failures: Vec<SinkError>,
}

impl CycleReport {
    pub fn restarted(&self) -> impl Iterator<Item = &CycleOutcome> {
        self.outcomes.iter().filter(|o| o.restarted)
    }
}

/// Runs watch cycles against injected process manager, prober, and store.
pub struct Watcher {
    config: WatchConfig,
    store: Arc<dyn RuntimeStore>,
    processes: Arc<dyn ProcessManager>,
    prober: Arc<dyn Prober>,
}

impl Watcher {
    /// Create a watcher that probes over the network.
    pub fn new(
        config: WatchConfig,
        store: Arc<dyn RuntimeStore>,
        processes: Arc<dyn ProcessManager>,
    ) -> Self {
        Self {
            config,
            store,
            processes,
            prober: Arc::new(NetProber),
        }
    }

    /// Replace the prober.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Run one cycle at the current wall-clock time.
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(epoch_secs()).await
    }

    /// Run one cycle as if the time were `now` (Unix seconds).
    pub async fn run_cycle_at(&self, now: u64) -> CycleReport {
        let mut acc = CycleAccumulator::new(now);
        let mut outcomes = Vec::new();
        let mut errors = Vec::new();

        for (name, spec) in self.config.enabled_services() {
            let mut state = match self.store.get(name) {
                Ok(state) => state,
                Err(e) => {
                    error!(service = %name, error = %e, "failed to load service state, skipping");
                    errors.push((name.to_string(), e));
                    continue;
                }
            };

            let outcome = self.evaluate(name, spec, &mut state, now).await;

            if let Err(e) = self.store.put(name, &state) {
                error!(service = %name, error = %e, "failed to persist service state");
                errors.push((name.to_string(), e));
            }

            acc.record(ServiceSample {
                service: name.to_string(),
                restarts_total: state.restarts_total(),
                health_failures_total: u64::from(state.health_failure_count),
                up: outcome.up(),
                rate_limited: outcome.rate_limited,
                restarted: outcome.restarted,
            });
            outcomes.push(outcome);
        }

        for (name, _) in self.config.services.iter().filter(|(_, spec)| !spec.enabled) {
            match self.store.get(name) {
                Ok(state) => acc.record(ServiceSample {
                    service: name.to_string(),
                    restarts_total: state.restarts_total(),
                    health_failures_total: u64::from(state.health_failure_count),
                    up: true,
                    rate_limited: false,
                    restarted: false,
                }),
                Err(e) => {
                    warn!(service = %name, error = %e, "failed to load state of disabled service");
                    errors.push((name.to_string(), e));
                }
            }
        }

        let snapshot = acc.finish();
        let metrics_body = render_prometheus(&snapshot);
        let sink_failures = emit(&self.config.metrics, &metrics_body).await;

        info!(
            services = outcomes.len(),
            restarts = snapshot.cycle_restarts,
            errors = errors.len(),
            "watch cycle complete"
        );

        CycleReport {
            outcomes,
            errors,
            snapshot,
            metrics_body,
            sink_failures,
        }
    }

    /// Evaluate one service, mutating its loaded state in place.
    async fn evaluate(
        &self,
        name: &str,
        spec: &ServiceSpec,
        state: &mut ServiceRuntimeState,
        now: u64,
    ) -> CycleOutcome {
        let observed = match self.processes.state(name).await {
            Ok(observed) => observed,
            Err(e) => {
                warn!(service = %name, error = %e, "unit state unavailable");
                UnitState::Unknown
            }
        };

        let dependency_changed = check_dependencies(
            self.processes.as_ref(),
            name,
            &spec.dependencies,
            &mut state.dependency_instance_ids,
        )
        .await;

        let mut healthy = None;
        let verdict = match health_check_to_run(spec, observed) {
            Some(check) => {
                let result = self.prober.probe(check).await;
                healthy = Some(result.is_healthy());
                Some(record_probe(
                    &mut state.health_failure_count,
                    result,
                    check.failures_before_restart,
                ))
            }
            None => None,
        };

        let mut outcome = CycleOutcome {
            service: name.to_string(),
            observed,
            healthy,
            reason: decide(spec, observed, verdict, dependency_changed),
            rate_limited: false,
            restarted: false,
            restart_failed: false,
        };

        let Some(reason) = outcome.reason else {
            return outcome;
        };

        match admit(state, &self.config.limits_for(spec), now) {
            Admission::Proceed => match self.processes.restart(name).await {
                Ok(()) => {
                    state.record_restart(now);
                    outcome.restarted = true;
                    info!(service = %name, %reason, "service restarted");
                }
                Err(e) => {
                    outcome.restart_failed = true;
                    error!(service = %name, %reason, error = %e, "restart failed");
                }
            },
            Admission::Suppressed { cooldown_until, .. } => {
                outcome.rate_limited = true;
                warn!(service = %name, %reason, cooldown_until, "restart suppressed by rate limit");
            }
        }

        outcome
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
