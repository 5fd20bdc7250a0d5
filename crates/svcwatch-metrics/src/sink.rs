//! Metrics delivery: textfile collector and HTTP push.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use thiserror::Error;
use tracing::{debug, warn};

use svcwatch_core::MetricsConfig;
use svcwatch_health::client::{self, HttpTarget};

/// Content type of the text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Errors delivering rendered metrics. Never fatal to a cycle.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics push to {url} failed: {message}")]
    Push { url: String, message: String },

    #[error("metrics push to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// Deliver `body` to every configured sink, logging each failure.
///
/// Returns the failures so callers can report them.
pub async fn emit(config: &MetricsConfig, body: &str) -> Vec<SinkError> {
    let mut failures = Vec::new();

    if let Some(path) = &config.textfile {
        match write_textfile(path, body) {
            Ok(()) => debug!(?path, "metrics textfile written"),
            Err(e) => {
                warn!(error = %e, "metrics textfile write failed");
                failures.push(e);
            }
        }
    }

    if let Some(url) = &config.push_url {
        match push(url, body.to_string(), config.push_timeout()).await {
            Ok(()) => debug!(%url, "metrics pushed"),
            Err(e) => {
                warn!(error = %e, "metrics push failed");
                failures.push(e);
            }
        }
    }

    failures
}

/// Replace `path` atomically: write a sibling `.tmp` file, then rename it.
pub fn write_textfile(path: &Path, body: &str) -> Result<(), SinkError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| SinkError::Io { path, source }
    };

    std::fs::write(&tmp, body).map_err(io_err(&tmp))?;
    if let Err(source) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path)(source));
    }
    Ok(())
}

/// POST `body` to `url` (an `http://` URL), bounded by `timeout`.
pub async fn push(url: &str, body: String, timeout: Duration) -> Result<(), SinkError> {
    let push_err = |message: String| SinkError::Push {
        url: url.to_string(),
        message,
    };

    let target = HttpTarget::parse(url).map_err(|e| push_err(e.to_string()))?;
    let request = client::send(
        &target,
        Method::POST,
        Some(EXPOSITION_CONTENT_TYPE),
        Bytes::from(body),
    );

    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(status)) if status.is_success() => Ok(()),
        Ok(Ok(status)) => Err(push_err(format!("endpoint returned {status}"))),
        Ok(Err(e)) => Err(push_err(e.to_string())),
        Err(_) => Err(SinkError::Timeout {
            url: url.to_string(),
            timeout,
        }),
    }
}
