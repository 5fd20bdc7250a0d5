//! svcwatch-state — durable per-service runtime state.
//!
//! Backed by [redb](https://docs.rs/redb). Each managed service owns one
//! record holding its health-failure counter, restart ledger, cooldown
//! expiry, and the last observed instance identifiers of its dependencies.
//!
//! # Architecture
//!
//! Records are JSON-serialized into a single `&str → &[u8]` table keyed by
//! service name. Every `put` runs in its own write transaction, so a
//! reader sees either the previous record or the new one, never a mix.
//!
//! The [`RuntimeStore`] trait is the key-value seam the watch cycle uses;
//! [`StateStore`] is its redb implementation. `StateStore` is `Clone` +
//! `Send` + `Sync` (backed by `Arc<Database>`). [`StateReader`] opens an
//! existing file read-only for `svcwatchd status`.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{RuntimeStore, StateReader, StateStore};
pub use types::*;
