//! The per-service restart decision.

use svcwatch_core::{HealthCheck, ServiceSpec};
use svcwatch_health::HealthVerdict;

use crate::process::UnitState;

/// Why a restart was requested. Only the highest-priority reason that
/// holds in a cycle is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The unit is failed and `on_failed` is set.
    Failed,
    /// The unit is inactive and `on_inactive` is set.
    Inactive,
    /// The health check reached its failure threshold.
    Health,
    /// A dependency's instance identifier changed since the last cycle.
    Dependency,
}

impl RestartReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartReason::Failed => "failed",
            RestartReason::Inactive => "inactive",
            RestartReason::Health => "health",
            RestartReason::Dependency => "dependency",
        }
    }
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The health check to run this cycle, if any.
///
/// Probes only run against active units. A failed or inactive unit is
/// either restarted for that reason or left alone; its failure counter is
/// not touched.
pub fn health_check_to_run(spec: &ServiceSpec, observed: UnitState) -> Option<&HealthCheck> {
    if observed == UnitState::Active {
        spec.active_health_check()
    } else {
        None
    }
}

/// Combine this cycle's observations into a restart verdict.
///
/// Priority, first match wins: failed → inactive → health → dependency.
/// The result is a request only; the rate limiter decides whether it runs.
pub fn decide(
    spec: &ServiceSpec,
    observed: UnitState,
    health: Option<HealthVerdict>,
    dependency_changed: bool,
) -> Option<RestartReason> {
    if spec.on_failed && observed == UnitState::Failed {
        return Some(RestartReason::Failed);
    }
    if spec.on_inactive && observed == UnitState::Inactive {
        return Some(RestartReason::Inactive);
    }
    if health.is_some_and(HealthVerdict::wants_restart) {
        return Some(RestartReason::Health);
    }
    if dependency_changed {
        return Some(RestartReason::Dependency);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcwatch_core::HealthKind;

    fn spec(on_failed: bool, on_inactive: bool) -> ServiceSpec {
        ServiceSpec {
            on_failed,
            on_inactive,
            health_check: Some(HealthCheck::new(HealthKind::Tcp, "127.0.0.1:80")),
            ..ServiceSpec::default()
        }
    }

    const REACHED: HealthVerdict = HealthVerdict::ThresholdReached { failures: 3 };

    #[test]
    fn failed_wins_over_everything() {
        let s = spec(true, true);
        assert_eq!(
            decide(&s, UnitState::Failed, Some(REACHED), true),
            Some(RestartReason::Failed)
        );
    }

    #[test]
    fn failed_ignored_without_on_failed() {
        let s = spec(false, false);
        assert_eq!(decide(&s, UnitState::Failed, None, false), None);
        // A dependency change still applies to a failed unit.
        assert_eq!(
            decide(&s, UnitState::Failed, None, true),
            Some(RestartReason::Dependency)
        );
    }

    #[test]
    fn inactive_requires_on_inactive() {
        assert_eq!(
            decide(&spec(true, true), UnitState::Inactive, None, false),
            Some(RestartReason::Inactive)
        );
        assert_eq!(decide(&spec(true, false), UnitState::Inactive, None, false), None);
    }

    #[test]
    fn health_threshold_beats_dependency() {
        assert_eq!(
            decide(&spec(true, false), UnitState::Active, Some(REACHED), true),
            Some(RestartReason::Health)
        );
    }

    #[test]
    fn failing_below_threshold_does_not_restart() {
        let failing = HealthVerdict::Failing { failures: 1 };
        assert_eq!(
            decide(&spec(true, false), UnitState::Active, Some(failing), false),
            None
        );
    }

    #[test]
    fn dependency_change_on_healthy_service() {
        assert_eq!(
            decide(&spec(true, false), UnitState::Active, Some(HealthVerdict::Healthy), true),
            Some(RestartReason::Dependency)
        );
    }

    #[test]
    fn nothing_to_do() {
        assert_eq!(
            decide(&spec(true, true), UnitState::Active, Some(HealthVerdict::Healthy), false),
            None
        );
        assert_eq!(decide(&spec(true, true), UnitState::Unknown, None, false), None);
    }

    #[test]
    fn probes_only_active_units() {
        let s = spec(true, false);
        assert!(health_check_to_run(&s, UnitState::Active).is_some());
        assert!(health_check_to_run(&s, UnitState::Failed).is_none());
        assert!(health_check_to_run(&s, UnitState::Inactive).is_none());
        assert!(health_check_to_run(&s, UnitState::Unknown).is_none());

        let mut disabled = s.clone();
        if let Some(check) = disabled.health_check.as_mut() {
            check.enabled = false;
        }
        assert!(health_check_to_run(&disabled, UnitState::Active).is_none());
    }
}
