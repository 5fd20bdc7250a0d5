//! svcwatch-health — health probing for managed services.
//!
//! Provides one probe per [`HealthKind`](svcwatch_core::HealthKind):
//! HTTP GET, TCP connect, and exec. Every probe is bounded by the check's
//! timeout and degrades any error to an unhealthy result; nothing here can
//! abort a watch cycle.
//!
//! # Architecture
//!
//! ```text
//! Prober (trait)  ←  NetProber
//!   └── probe(&HealthCheck) → ProbeResult
//!         ├── http_probe()
//!         ├── tcp_probe()
//!         └── exec_probe()
//!
//! record_probe(&mut failure_count, result, threshold) → HealthVerdict
//! ```
//!
//! [`client`] is the one-request HTTP/1.1 client behind `http_probe`; the
//! metrics push sink reuses it.
//!
//! A single healthy probe resets the persisted failure counter. Reaching
//! the threshold asks for a restart and resets the counter as well.

pub mod checker;
pub mod client;
pub mod tracker;

pub use checker::{NetProber, ProbeFuture, ProbeResult, Prober, probe};
pub use client::{HttpError, HttpTarget};
pub use tracker::{HealthVerdict, record_probe};
