//! svcwatch-metrics — observability for the service watcher.
//!
//! Accumulates one sample per evaluated service during a cycle, renders
//! the result in the Prometheus text exposition format, and delivers it
//! to a textfile collector and/or a push endpoint.
//!
//! # Architecture
//!
//! ```text
//! CycleAccumulator
//!   ├── record(ServiceSample) ← once per evaluated service
//!   └── finish() → MetricsSnapshot
//!
//! render_prometheus(&MetricsSnapshot) → text body
//!
//! emit(&MetricsConfig, body)
//!   ├── write_textfile() (tmp file + rename)
//!   └── push() (HTTP POST)
//! ```
//!
//! Sink failures are logged and reported, never propagated into restart
//! decisions.

pub mod collector;
pub mod prometheus;
pub mod sink;

pub use collector::{CycleAccumulator, MetricsSnapshot, ServiceSample};
pub use prometheus::render_prometheus;
pub use sink::{SinkError, emit, push, write_textfile};
