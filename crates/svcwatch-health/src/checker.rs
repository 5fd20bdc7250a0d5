//! Health probes, one evaluator per check kind, each bounded by the
//! configured timeout.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
#[cfg(unix)]
use nix::sys::signal::Signal;
use tracing::{debug, warn};

use svcwatch_core::{HealthCheck, HealthKind};

use crate::client::{self, HttpTarget};

/// Longest slice of exec output included in log lines.
const MAX_LOGGED_OUTPUT: usize = 512;

/// How long a timed-out exec command gets between SIGTERM and SIGKILL.
pub const EXEC_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The check passed.
    Healthy,
    /// The target answered but the check did not pass (non-2xx, non-zero exit).
    Unhealthy,
    /// The probe could not complete (connection error, timeout, spawn failure).
    Failed,
}

impl ProbeResult {
    pub fn is_healthy(self) -> bool {
        self == ProbeResult::Healthy
    }
}

/// Boxed future returned by [`Prober::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>>;

/// Executes health checks. Watch cycles take this as a trait object so
/// probes can be scripted.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, check: &'a HealthCheck) -> ProbeFuture<'a>;
}

/// The real prober: talks to the network and spawns commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetProber;

impl Prober for NetProber {
    fn probe<'a>(&'a self, check: &'a HealthCheck) -> ProbeFuture<'a> {
        Box::pin(probe(check))
    }
}

/// Run the evaluator matching the check's kind.
pub async fn probe(check: &HealthCheck) -> ProbeResult {
    let timeout = check.timeout();
    match check.kind {
        HealthKind::Http => http_probe(&check.target, timeout).await,
        HealthKind::Tcp => tcp_probe(&check.target, timeout).await,
        HealthKind::Exec => exec_probe(&check.target, timeout).await,
    }
}

/// Perform an HTTP GET against `url` (an `http://` URL).
///
/// Returns `Healthy` if the response is 2xx, `Unhealthy` for non-2xx,
/// or `Failed` if the connection fails or times out.
pub async fn http_probe(url: &str, timeout: Duration) -> ProbeResult {
    let target = match HttpTarget::parse(url) {
        Ok(target) => target,
        Err(e) => {
            debug!(error = %e, "health probe url invalid");
            return ProbeResult::Failed;
        }
    };

    let request = client::send(&target, Method::GET, None, Bytes::new());
    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(status)) if status.is_success() => ProbeResult::Healthy,
        Ok(Ok(status)) => {
            debug!(%status, %url, "health probe non-2xx");
            ProbeResult::Unhealthy
        }
        Ok(Err(e)) => {
            debug!(error = %e, %url, "health probe request failed");
            ProbeResult::Failed
        }
        Err(_) => {
            debug!(%url, "health probe timed out");
            ProbeResult::Failed
        }
    }
}

/// Attempt a TCP connection to `address` (`host:port`).
pub async fn tcp_probe(address: &str, timeout: Duration) -> ProbeResult {
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await {
        Ok(Ok(_)) => ProbeResult::Healthy,
        Ok(Err(e)) => {
            debug!(error = %e, %address, "tcp probe connection failed");
            ProbeResult::Failed
        }
        Err(_) => {
            debug!(%address, "tcp probe timed out");
            ProbeResult::Failed
        }
    }
}

/// Run `command` through `sh -c`; healthy iff it exits 0 within `timeout`.
///
/// The shell leads its own process group. On timeout the whole group gets
/// SIGTERM, then SIGKILL after [`EXEC_GRACE_PERIOD`], so commands started
/// by the shell die with it.
pub async fn exec_probe(command: &str, timeout: Duration) -> ProbeResult {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    {
        #[allow(unused_imports)]
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(error = %e, %command, "exec probe failed to spawn");
            return ProbeResult::Failed;
        }
    };
    let group = child.id();

    let output = child.wait_with_output();
    tokio::pin!(output);
    match tokio::time::timeout(timeout, &mut output).await {
        Ok(Ok(output)) if output.status.success() => ProbeResult::Healthy,
        Ok(Ok(output)) => {
            warn!(
                %command,
                code = ?output.status.code(),
                stdout = %truncate(&output.stdout),
                stderr = %truncate(&output.stderr),
                "exec probe exited non-zero"
            );
            ProbeResult::Unhealthy
        }
        Ok(Err(e)) => {
            warn!(error = %e, %command, "exec probe wait failed");
            ProbeResult::Failed
        }
        Err(_) => {
            #[cfg(unix)]
            if let Some(group) = group {
                signal_group(group, Signal::SIGTERM);
                if tokio::time::timeout(EXEC_GRACE_PERIOD, &mut output).await.is_err() {
                    signal_group(group, Signal::SIGKILL);
                }
            }
            warn!(%command, timeout_ms = timeout.as_millis() as u64, "exec probe timed out, killed");
            ProbeResult::Failed
        }
    }
}

#[cfg(unix)]
fn signal_group(group: u32, signal: Signal) {
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(group) else {
        return;
    };
    if let Err(e) = nix::sys::signal::killpg(Pid::from_raw(raw), signal) {
        debug!(error = %e, group, ?signal, "exec probe group already gone");
    }
}

fn truncate(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    match text.char_indices().nth(MAX_LOGGED_OUTPUT) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
