//! svcwatchd — the service watcher daemon.
//!
//! Each `run` invocation performs exactly one watch cycle over the
//! configured systemd units and exits; schedule it with a systemd timer or
//! cron. Durable state lives in a redb file under the state directory.
//!
//! # Usage
//!
//! ```text
//! svcwatchd run --config /etc/svcwatch/config.toml --state-dir /var/lib/svcwatch
//! svcwatchd check-config --config /etc/svcwatch/config.toml --config-dir /etc/svcwatch/conf.d
//! svcwatchd status --service nginx
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use svcwatch_core::load_config;
use svcwatch_engine::{SystemdManager, Watcher};
use svcwatch_state::{StateReader, StateStore};

/// State database file name inside `--state-dir`.
const STATE_FILE: &str = "svcwatch.redb";

#[derive(Parser)]
#[command(name = "svcwatchd", about = "Auto-healing service watcher")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one watch cycle.
    Run {
        /// Base configuration file (TOML or JSON).
        #[arg(long)]
        config: PathBuf,

        /// Directory of overlay fragments merged over the base file.
        #[arg(long)]
        config_dir: Option<PathBuf>,

        /// Directory holding the persistent state database.
        #[arg(long, default_value = "/var/lib/svcwatch")]
        state_dir: PathBuf,

        /// Manage the calling user's units (`systemctl --user`).
        #[arg(long)]
        user: bool,
    },

    /// Load and validate the configuration, then print the services.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        config_dir: Option<PathBuf>,
    },

    /// Print persisted runtime state as JSON.
    Status {
        #[arg(long, default_value = "/var/lib/svcwatch")]
        state_dir: PathBuf,

        /// Only this service.
        #[arg(long)]
        service: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run {
            config,
            config_dir,
            state_dir,
            user,
        } => run(&config, config_dir.as_deref(), &state_dir, user).await,
        Command::CheckConfig { config, config_dir } => {
            check_config(&config, config_dir.as_deref())
        }
        Command::Status { state_dir, service } => status(&state_dir, service.as_deref()),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,svcwatch=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Per-service failures are logged by the cycle and never change the exit
/// status; only configuration and state-store setup are fatal.
async fn run(
    config_path: &Path,
    config_dir: Option<&Path>,
    state_dir: &Path,
    user: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path, config_dir)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;
    let db_path = state_dir.join(STATE_FILE);
    let store = StateStore::open(&db_path)
        .with_context(|| format!("failed to open state store {}", db_path.display()))?;

    let timeout = config.process.command_timeout();
    let processes = if user {
        SystemdManager::user(timeout)
    } else {
        SystemdManager::new(timeout)
    };

    info!(
        services = config.enabled_services().count(),
        state = %db_path.display(),
        "starting watch cycle"
    );

    let watcher = Watcher::new(config, Arc::new(store), Arc::new(processes));
    let report = watcher.run_cycle().await;

    let rate_limited = report.outcomes.iter().filter(|o| o.rate_limited).count();
    let restart_failures = report.outcomes.iter().filter(|o| o.restart_failed).count();
    info!(
        restarted = report.restarted().count(),
        rate_limited,
        restart_failures,
        state_errors = report.errors.len(),
        sink_failures = report.sink_failures.len(),
        "svcwatchd finished"
    );

    Ok(())
}

fn check_config(config_path: &Path, config_dir: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path, config_dir)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let defaults = &config.rate_limiting;
    println!(
        "rate limiting: max {} restarts per {}m, cooldown {}m",
        defaults.max_restarts, defaults.window_minutes, defaults.cooldown_minutes
    );

    for (name, spec) in &config.services {
        let limits = config.limits_for(spec);
        let health = match spec.active_health_check() {
            Some(check) => format!(
                "{} {} (after {} failures)",
                check.kind, check.target, check.failures_before_restart
            ),
            None => "none".to_string(),
        };
        println!(
            "{name}: enabled={} on_failed={} on_inactive={} health={health} \
             dependencies=[{}] limit={}/{}s",
            spec.enabled,
            spec.on_failed,
            spec.on_inactive,
            spec.dependencies.join(", "),
            limits.max_restarts,
            limits.window_secs,
        );
    }

    println!("{} services, configuration OK", config.services.len());
    Ok(())
}

fn status(state_dir: &Path, service: Option<&str>) -> anyhow::Result<()> {
    let db_path = state_dir.join(STATE_FILE);
    if !db_path.exists() {
        bail!("no state store at {}", db_path.display());
    }
    let store = StateReader::open(&db_path)
        .with_context(|| format!("failed to open state store {}", db_path.display()))?;

    let records: BTreeMap<String, _> = match service {
        Some(name) => BTreeMap::from([(name.to_string(), store.get(name)?)]),
        None => store.list()?.into_iter().collect(),
    };

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
