//! Watcher configuration document.
//!
//! Keys are snake_case. The camelCase spellings produced by upstream
//! config generators (`rateLimiting`, `maxRestarts`, `onFailed`, ...) are
//! accepted as aliases so either document style deserializes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// The fully merged configuration handed to a watch cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WatchConfig {
    /// Global restart-rate policy.
    #[serde(default, alias = "rateLimiting")]
    pub rate_limiting: RateLimitDefaults,
    /// Where rendered metrics go.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Process manager call settings.
    #[serde(default)]
    pub process: ProcessConfig,
    /// Managed services keyed by unit name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

/// Global rate-limiting defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitDefaults {
    #[serde(default = "default_max_restarts", alias = "maxRestarts")]
    pub max_restarts: u32,
    #[serde(default = "default_window_minutes", alias = "windowMinutes")]
    pub window_minutes: u64,
    /// Cooldown after a rate-limit trip. There is no per-service override.
    #[serde(default = "default_cooldown_minutes", alias = "cooldownMinutes")]
    pub cooldown_minutes: u64,
}

impl Default for RateLimitDefaults {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            window_minutes: default_window_minutes(),
            cooldown_minutes: default_cooldown_minutes(),
        }
    }
}

/// Per-service rate-limit overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RateLimitOverride {
    #[serde(default, alias = "maxRestarts")]
    pub max_restarts: Option<u32>,
    #[serde(default, alias = "windowMinutes")]
    pub window_minutes: Option<u64>,
}

/// Effective rate limits for one service, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub max_restarts: u32,
    pub window_secs: u64,
    pub cooldown_secs: u64,
}

/// Metrics sink settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    /// Textfile-collector path, replaced atomically each cycle.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
    /// Push endpoint receiving the same body via HTTP POST.
    #[serde(default, alias = "pushUrl")]
    pub push_url: Option<String>,
    #[serde(default = "default_push_timeout", alias = "pushTimeout")]
    pub push_timeout: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            textfile: None,
            push_url: None,
            push_timeout: default_push_timeout(),
        }
    }
}

impl MetricsConfig {
    pub fn push_timeout(&self) -> Duration {
        parse_duration(&self.push_timeout).unwrap_or(DEFAULT_PUSH_TIMEOUT)
    }
}

/// Process manager settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessConfig {
    /// Upper bound on any single process-manager call.
    #[serde(default = "default_command_timeout", alias = "commandTimeout")]
    pub command_timeout: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            command_timeout: default_command_timeout(),
        }
    }
}

impl ProcessConfig {
    pub fn command_timeout(&self) -> Duration {
        parse_duration(&self.command_timeout).unwrap_or(DEFAULT_COMMAND_TIMEOUT)
    }
}

/// One managed service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Restart when the process manager reports the unit failed.
    #[serde(default = "default_true", alias = "onFailed")]
    pub on_failed: bool,
    /// Restart when the process manager reports the unit inactive.
    #[serde(default, alias = "onInactive")]
    pub on_inactive: bool,
    #[serde(default, alias = "healthCheck")]
    pub health_check: Option<HealthCheck>,
    /// Units whose restarts propagate to this service, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "rateLimiting")]
    pub rate_limiting: RateLimitOverride,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            on_failed: true,
            on_inactive: false,
            health_check: None,
            dependencies: Vec::new(),
            rate_limiting: RateLimitOverride::default(),
        }
    }
}

impl ServiceSpec {
    /// The health check, if one is configured and switched on.
    pub fn active_health_check(&self) -> Option<&HealthCheck> {
        self.health_check.as_ref().filter(|h| h.enabled)
    }
}

/// Health check kinds. Each variant has its own evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthKind {
    /// HTTP GET; healthy on a 2xx response.
    Http,
    /// TCP connect to `host:port`.
    Tcp,
    /// Shell command; healthy on exit status 0.
    Exec,
}

impl HealthKind {
    /// The name used for this kind in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            HealthKind::Http => "http",
            HealthKind::Tcp => "tcp",
            HealthKind::Exec => "exec",
        }
    }
}

impl std::fmt::Display for HealthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health check parameters for a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthCheck {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: HealthKind,
    /// URL, `host:port`, or command line depending on `kind`.
    pub target: String,
    #[serde(default = "default_probe_timeout")]
    pub timeout: String,
    /// Consecutive failed probes before a restart is requested.
    #[serde(
        default = "default_failures_before_restart",
        alias = "failuresBeforeRestart"
    )]
    pub failures_before_restart: u32,
}

impl HealthCheck {
    pub fn new(kind: HealthKind, target: &str) -> Self {
        Self {
            enabled: true,
            kind,
            target: target.to_string(),
            timeout: default_probe_timeout(),
            failures_before_restart: default_failures_before_restart(),
        }
    }

    /// Probe timeout, falling back to 5s when the string does not parse.
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }
}

impl WatchConfig {
    /// Enabled services in name order.
    pub fn enabled_services(&self) -> impl Iterator<Item = (&str, &ServiceSpec)> {
        self.services
            .iter()
            .filter(|(_, spec)| spec.enabled)
            .map(|(name, spec)| (name.as_str(), spec))
    }

    /// Resolve a service's limits: its overrides first, then the globals.
    ///
    /// The cooldown always comes from the global policy.
    pub fn limits_for(&self, spec: &ServiceSpec) -> RateLimits {
        let defaults = &self.rate_limiting;
        RateLimits {
            max_restarts: spec
                .rate_limiting
                .max_restarts
                .unwrap_or(defaults.max_restarts),
            window_secs: spec
                .rate_limiting
                .window_minutes
                .unwrap_or(defaults.window_minutes)
                .saturating_mul(60),
            cooldown_secs: defaults.cooldown_minutes.saturating_mul(60),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_restarts() -> u32 {
    5
}

fn default_window_minutes() -> u64 {
    15
}

fn default_cooldown_minutes() -> u64 {
    30
}

fn default_failures_before_restart() -> u32 {
    3
}

fn default_probe_timeout() -> String {
    "5s".to_string()
}

fn default_push_timeout() -> String {
    "5s".to_string()
}

fn default_command_timeout() -> String {
    "30s".to_string()
}
