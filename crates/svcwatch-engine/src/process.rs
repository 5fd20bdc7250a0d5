//! Process manager seam and its systemd implementation.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use crate::error::{ProcessError, ProcessResult};

/// Lifecycle state reported by the process manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Active,
    Inactive,
    Failed,
    /// Transitional, unrecognised, or unreadable.
    Unknown,
}

impl UnitState {
    /// Map a systemd `ActiveState` value.
    pub fn from_systemd(active_state: &str) -> Self {
        match active_state.trim() {
            "active" | "reloading" => UnitState::Active,
            "inactive" => UnitState::Inactive,
            "failed" => UnitState::Failed,
            _ => UnitState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitState::Active => "active",
            UnitState::Inactive => "inactive",
            UnitState::Failed => "failed",
            UnitState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boxed future returned by [`ProcessManager`] methods.
pub type ProcessFuture<'a, T> = Pin<Box<dyn Future<Output = ProcessResult<T>> + Send + 'a>>;

/// The external process manager: reports unit state and per-start
/// instance identity, and restarts units on command.
pub trait ProcessManager: Send + Sync {
    /// Current lifecycle state of `unit`.
    fn state<'a>(&'a self, unit: &'a str) -> ProcessFuture<'a, UnitState>;

    /// Opaque identifier assigned each time `unit` starts, if it has one.
    fn instance_id<'a>(&'a self, unit: &'a str) -> ProcessFuture<'a, Option<String>>;

    /// Restart `unit`.
    fn restart<'a>(&'a self, unit: &'a str) -> ProcessFuture<'a, ()>;
}

/// systemd via `systemctl`, every call bounded by a timeout.
#[derive(Debug, Clone)]
pub struct SystemdManager {
    program: String,
    /// Arguments placed before every subcommand (e.g. `--user`).
    leading_args: Vec<String>,
    timeout: Duration,
}

impl SystemdManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "systemctl".to_string(),
            leading_args: Vec::new(),
            timeout,
        }
    }

    /// Manage the calling user's units (`systemctl --user`).
    pub fn user(timeout: Duration) -> Self {
        Self::new(timeout).with_command("systemctl", ["--user"])
    }

    /// Use a different `systemctl`-compatible command line.
    pub fn with_command<I, S>(mut self, program: impl Into<String>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.leading_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    /// `systemctl show --property=<property> --value <unit>`, trimmed.
    async fn show(&self, unit: &str, property: &str) -> ProcessResult<String> {
        let arg = format!("--property={property}");
        self.run(&["show", &arg, "--value", unit]).await
    }

    /// Run the program and return its stdout. The child is killed if the
    /// timeout elapses.
    async fn run(&self, args: &[&str]) -> ProcessResult<String> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, "invoking process manager");

        let child = tokio::process::Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ProcessError::Spawn {
                    program: self.program.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(ProcessError::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(ProcessError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ProcessManager for SystemdManager {
    fn state<'a>(&'a self, unit: &'a str) -> ProcessFuture<'a, UnitState> {
        Box::pin(async move {
            let value = self.show(unit, "ActiveState").await?;
            Ok(UnitState::from_systemd(&value))
        })
    }

    fn instance_id<'a>(&'a self, unit: &'a str) -> ProcessFuture<'a, Option<String>> {
        Box::pin(async move {
            let value = self.show(unit, "InvocationID").await?;
            Ok((!value.is_empty()).then_some(value))
        })
    }

    fn restart<'a>(&'a self, unit: &'a str) -> ProcessFuture<'a, ()> {
        Box::pin(async move {
            self.run(&["restart", unit]).await?;
            Ok(())
        })
    }
}
