//! Prometheus text exposition format.
//!
//! Renders a cycle's metrics snapshot for a textfile collector or a push
//! gateway.

use std::fmt::Write;

use crate::collector::{MetricsSnapshot, ServiceSample};

/// Render a snapshot into Prometheus text format.
///
/// Produces COUNTER and GAUGE families with `service` labels, followed by
/// unlabelled gauges describing the cycle itself.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    per_service(
        &mut out,
        "svcwatch_restarts_total",
        "Restarts recorded in the service's restart ledger.",
        "counter",
        snapshot,
        |s| s.restarts_total.to_string(),
    );
    per_service(
        &mut out,
        "svcwatch_health_failures_total",
        "Consecutive failed health probes.",
        "counter",
        snapshot,
        |s| s.health_failures_total.to_string(),
    );
    per_service(
        &mut out,
        "svcwatch_up",
        "Whether the service was up during the last cycle.",
        "gauge",
        snapshot,
        |s| u8::from(s.up).to_string(),
    );
    per_service(
        &mut out,
        "svcwatch_rate_limited",
        "Whether a restart was suppressed by rate limiting during the last cycle.",
        "gauge",
        snapshot,
        |s| u8::from(s.rate_limited).to_string(),
    );

    out.push_str("# HELP svcwatch_cycle_restarts Restart commands issued during the last cycle.\n");
    out.push_str("# TYPE svcwatch_cycle_restarts gauge\n");
    let _ = writeln!(out, "svcwatch_cycle_restarts {}", snapshot.cycle_restarts);

    out.push_str("# HELP svcwatch_cycle_duration_seconds Wall time of the last cycle.\n");
    out.push_str("# TYPE svcwatch_cycle_duration_seconds gauge\n");
    let _ = writeln!(
        out,
        "svcwatch_cycle_duration_seconds {:.3}",
        snapshot.cycle_duration_secs
    );

    out.push_str("# HELP svcwatch_last_cycle_timestamp_seconds Unix time the last cycle started.\n");
    out.push_str("# TYPE svcwatch_last_cycle_timestamp_seconds gauge\n");
    let _ = writeln!(
        out,
        "svcwatch_last_cycle_timestamp_seconds {}",
        snapshot.timestamp
    );

    out
}

fn per_service(
    out: &mut String,
    name: &str,
    help: &str,
    kind: &str,
    snapshot: &MetricsSnapshot,
    value: impl Fn(&ServiceSample) -> String,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    for s in &snapshot.services {
        let _ = writeln!(
            out,
            "{name}{{service=\"{}\"}} {}",
            escape_label(&s.service),
            value(s)
        );
    }
}

/// Escape a label value: backslash, double quote, and newline.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
