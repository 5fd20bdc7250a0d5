//! Semantic validation of a merged [`WatchConfig`].

use std::collections::HashMap;

use crate::config::{HealthCheck, HealthKind, WatchConfig};
use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};

/// Upper bound for window and cooldown lengths: one year.
pub const MAX_MINUTES: u64 = 365 * 24 * 60;

/// Reject configurations the watcher cannot act on safely.
///
/// Dependencies on units that are not configured services are allowed;
/// they are observed but never restarted by the watcher.
pub fn validate(config: &WatchConfig) -> ConfigResult<()> {
    let limits = &config.rate_limiting;
    if limits.max_restarts == 0 {
        return invalid("rate_limiting.max_restarts must be at least 1");
    }
    if limits.window_minutes == 0 {
        return invalid("rate_limiting.window_minutes must be at least 1");
    }
    if limits.window_minutes > MAX_MINUTES {
        return invalid(format!(
            "rate_limiting.window_minutes must be at most {MAX_MINUTES}"
        ));
    }
    if limits.cooldown_minutes > MAX_MINUTES {
        return invalid(format!(
            "rate_limiting.cooldown_minutes must be at most {MAX_MINUTES}"
        ));
    }
    if parse_duration(&config.process.command_timeout).is_none_or(|d| d.is_zero()) {
        return invalid("process.command_timeout must be a positive duration");
    }

    for (name, spec) in &config.services {
        if name.trim().is_empty() {
            return invalid("service names must not be empty");
        }
        if spec.rate_limiting.max_restarts == Some(0) {
            return invalid(format!("{name}: rate_limiting.max_restarts must be at least 1"));
        }
        if spec.rate_limiting.window_minutes == Some(0) {
            return invalid(format!("{name}: rate_limiting.window_minutes must be at least 1"));
        }
        if spec.rate_limiting.window_minutes > Some(MAX_MINUTES) {
            return invalid(format!(
                "{name}: rate_limiting.window_minutes must be at most {MAX_MINUTES}"
            ));
        }
        if spec.dependencies.iter().any(|d| d == name) {
            return invalid(format!("{name}: a service cannot depend on itself"));
        }
        if let Some(check) = &spec.health_check {
            validate_health_check(name, check)?;
        }
    }

    if let Some(cycle) = find_dependency_cycle(config) {
        return invalid(format!("dependency cycle: {}", cycle.join(" -> ")));
    }

    Ok(())
}

fn validate_health_check(name: &str, check: &HealthCheck) -> ConfigResult<()> {
    if check.failures_before_restart == 0 {
        return invalid(format!(
            "{name}: health_check.failures_before_restart must be at least 1"
        ));
    }
    if parse_duration(&check.timeout).is_none_or(|d| d.is_zero()) {
        return invalid(format!(
            "{name}: health_check.timeout {:?} is not a positive duration",
            check.timeout
        ));
    }

    let target = check.target.trim();
    if target.is_empty() {
        return invalid(format!("{name}: health_check.target must not be empty"));
    }
    match check.kind {
        HealthKind::Http if !target.starts_with("http://") => invalid(format!(
            "{name}: http health checks need an http:// URL, got {target:?}"
        )),
        HealthKind::Tcp if !has_port(target) => invalid(format!(
            "{name}: tcp health checks need host:port, got {target:?}"
        )),
        _ => Ok(()),
    }
}

fn has_port(target: &str) -> bool {
    target
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search over configured services. Returns the first cycle
/// found as a path that starts and ends on the same service.
fn find_dependency_cycle(config: &WatchConfig) -> Option<Vec<String>> {
    fn visit<'a>(
        name: &'a str,
        config: &'a WatchConfig,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(name) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        path.push(name);
        if let Some(spec) = config.services.get(name) {
            for dep in &spec.dependencies {
                if config.services.contains_key(dep.as_str())
                    && let Some(cycle) = visit(dep, config, marks, path)
                {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        marks.insert(name, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    config
        .services
        .keys()
        .find_map(|name| visit(name, config, &mut marks, &mut path))
}

fn invalid<T>(message: impl Into<String>) -> ConfigResult<T> {
    Err(ConfigError::Invalid(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSpec;

    fn with_services(services: &[(&str, &[&str])]) -> WatchConfig {
        let mut config = WatchConfig::default();
        for (name, deps) in services {
            config.services.insert(
                name.to_string(),
                ServiceSpec {
                    dependencies: deps.iter().map(|d| d.to_string()).collect(),
                    ..ServiceSpec::default()
                },
            );
        }
        config
    }

    fn error_message(config: &WatchConfig) -> String {
        validate(config).unwrap_err().to_string()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&WatchConfig::default()).is_ok());
    }

    #[test]
    fn acyclic_dependencies_are_valid() {
        let config = with_services(&[("app", &["db", "cache"]), ("cache", &["db"]), ("db", &[])]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn unmanaged_dependency_is_allowed() {
        let config = with_services(&[("app", &["postgresql.service"])]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn self_dependency_rejected() {
        let config = with_services(&[("app", &["app"])]);
        assert!(error_message(&config).contains("itself"));
    }

    #[test]
    fn two_node_cycle_rejected() {
        let config = with_services(&[("a", &["b"]), ("b", &["a"])]);
        let msg = error_message(&config);
        assert!(msg.contains("a -> b -> a"), "{msg}");
    }

    #[test]
    fn longer_cycle_rejected() {
        let config = with_services(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &["a"])]);
        assert!(error_message(&config).contains("dependency cycle"));
    }

    #[test]
    fn zero_limits_rejected() {
        let mut config = WatchConfig::default();
        config.rate_limiting.max_restarts = 0;
        assert!(validate(&config).is_err());

        let mut config = with_services(&[("a", &[])]);
        config.services.get_mut("a").unwrap().rate_limiting.window_minutes = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn health_check_targets_checked() {
        let mut config = with_services(&[("a", &[])]);
        let spec = config.services.get_mut("a").unwrap();

        spec.health_check = Some(HealthCheck::new(HealthKind::Tcp, "localhost"));
        assert!(validate(&config).is_err());

        config.services.get_mut("a").unwrap().health_check =
            Some(HealthCheck::new(HealthKind::Tcp, "localhost:5432"));
        assert!(validate(&config).is_ok());

        config.services.get_mut("a").unwrap().health_check =
            Some(HealthCheck::new(HealthKind::Http, "https://example.com/"));
        assert!(validate(&config).is_err());

        config.services.get_mut("a").unwrap().health_check =
            Some(HealthCheck::new(HealthKind::Exec, "  "));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_failure_threshold_rejected() {
        let mut config = with_services(&[("a", &[])]);
        let mut check = HealthCheck::new(HealthKind::Exec, "true");
        check.failures_before_restart = 0;
        config.services.get_mut("a").unwrap().health_check = Some(check);
        assert!(error_message(&config).contains("failures_before_restart"));
    }

    #[test]
    fn bad_timeout_rejected() {
        let mut config = with_services(&[("a", &[])]);
        let mut check = HealthCheck::new(HealthKind::Exec, "true");
        check.timeout = "0s".into();
        config.services.get_mut("a").unwrap().health_check = Some(check);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn oversized_windows_rejected() {
        let mut config = WatchConfig::default();
        config.rate_limiting.cooldown_minutes = u64::MAX / 2;
        assert!(error_message(&config).contains("cooldown_minutes"));

        let mut config = WatchConfig::default();
        config.rate_limiting.window_minutes = MAX_MINUTES + 1;
        assert!(error_message(&config).contains("window_minutes"));

        let mut config = with_services(&[("a", &[])]);
        config.services.get_mut("a").unwrap().rate_limiting.window_minutes = Some(u64::MAX);
        assert!(error_message(&config).contains("a: rate_limiting.window_minutes"));

        let mut config = WatchConfig::default();
        config.rate_limiting.window_minutes = MAX_MINUTES;
        config.rate_limiting.cooldown_minutes = MAX_MINUTES;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn overflowing_command_timeout_rejected() {
        let mut config = WatchConfig::default();
        config.process.command_timeout = "307445734561825862m".into();
        assert!(error_message(&config).contains("command_timeout"));
    }
}
