//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_upstream_requests_total` (counter): outbound calls by method, status
//! - `mesh_upstream_request_duration_seconds` (histogram): outbound latency
//! - `mesh_upstream_retries_total` (counter): retried transport failures
//! - `mesh_rate_limit_waits_total` (counter): callers that found the gate full
//! - `mesh_registry_services` (gauge): registered service count
//! - `mesh_cache_operations_total` (counter): cache ops by op, result
//! - `mesh_broker_publish_total` (counter): publishes by result
//! - `mesh_store_available` (gauge): 1=networked, 0=degraded, per store
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished outbound call. `status` is 0 when no response arrived.
pub fn record_upstream_request(method: &str, status: u16, start: Instant) {
    counter!(
        "mesh_upstream_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("mesh_upstream_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    counter!("mesh_upstream_retries_total").increment(1);
}

pub fn record_rate_limit_wait() {
    counter!("mesh_rate_limit_waits_total").increment(1);
}

pub fn set_registry_size(size: usize) {
    gauge!("mesh_registry_services").set(size as f64);
}

pub fn record_cache_op(op: &'static str, result: &'static str) {
    counter!("mesh_cache_operations_total", "op" => op, "result" => result).increment(1);
}

pub fn record_broker_publish(result: &'static str) {
    counter!("mesh_broker_publish_total", "result" => result).increment(1);
}

pub fn record_store_available(store: &'static str, available: bool) {
    gauge!("mesh_store_available", "store" => store).set(if available { 1.0 } else { 0.0 });
}
