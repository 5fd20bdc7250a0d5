//! Process manager error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for process manager calls.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors talking to the process manager. All are recovered per service.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}
