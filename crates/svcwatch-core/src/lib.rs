//! svcwatch-core — configuration for the service watcher.
//!
//! Parses the watcher's configuration document (TOML or JSON), merges
//! override fragments from a drop-in directory, and validates the result
//! before any cycle runs. Everything downstream receives a finished
//! [`WatchConfig`] and never re-reads configuration files.

pub mod config;
pub mod duration;
pub mod error;
pub mod loader;
pub mod validate;

pub use config::*;
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use validate::validate;
