//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_proxy_requests_total` (counter): proxied calls by config, outcome
//! - `relay_upstream_duration_seconds` (histogram): upstream latency by config
//! - `relay_store_mutations_total` (counter): config store writes by operation

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_proxy_request(config_id: &str, outcome: &'static str) {
    metrics::counter!(
        "relay_proxy_requests_total",
        "config" => config_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_upstream_latency(config_id: &str, elapsed: Duration) {
    metrics::histogram!(
        "relay_upstream_duration_seconds",
        "config" => config_id.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_store_mutation(op: &'static str) {
    metrics::counter!("relay_store_mutations_total", "op" => op).increment(1);
}
