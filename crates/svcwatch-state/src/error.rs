//! State store errors.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// Database-level failures carry only the backend message; record-level
/// failures name the service whose record was involved.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state database: {0}")]
    Open(String),

    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("service_state table unavailable: {0}")]
    Table(String),

    #[error("failed to read state of {service}: {message}")]
    Read { service: String, message: String },

    #[error("failed to write state of {service}: {message}")]
    Write { service: String, message: String },

    #[error("failed to encode state of {service}: {message}")]
    Encode { service: String, message: String },

    #[error("stored state of {service} is corrupt: {message}")]
    Corrupt { service: String, message: String },
}
