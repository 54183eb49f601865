//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_resource_starts_total` (counter): resource boots by outcome
//! - `lifecycle_shutdown_actions_total` (counter): shutdown actions by outcome
//! - `lifecycle_shutdown_duration_seconds` (histogram): registry drain time
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Outcome labels are a small fixed set (ok, failed, timed_out, skipped, ready, interrupted)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_resource_start(outcome: &'static str) {
    metrics::counter!("lifecycle_resource_starts_total", "outcome" => outcome).increment(1);
}

pub fn record_shutdown_action(outcome: &'static str) {
    metrics::counter!("lifecycle_shutdown_actions_total", "outcome" => outcome).increment(1);
}

pub fn record_shutdown_duration(elapsed: Duration) {
    metrics::histogram!("lifecycle_shutdown_duration_seconds").record(elapsed.as_secs_f64());
}
