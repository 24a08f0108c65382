//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (throughput, latency, rejections, alerts)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): responses sent, by method and status
//! - `proxy_request_duration_seconds` (histogram): latency distribution by method
//! - `proxy_rejections_total` (counter): requests stopped by the pipeline, by reason
//! - `proxy_upstream_errors_total` (counter): failed upstream exchanges
//! - `proxy_alerts_total` (counter): cap crossings reported, by kind
//!
//! # Design Decisions
//! - Recording is a no-op until the exporter is installed, so the
//!   facade can be called unconditionally from the hot path
//! - Labels are low-cardinality only (method, status, reason, kind)

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter and serve the scrape endpoint.
///
/// Must run inside the Tokio runtime; the exporter spawns its own
/// listener task on it.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => {
            metrics::describe_counter!(
                "proxy_requests_total",
                "Responses sent to clients, by method and status"
            );
            metrics::describe_histogram!(
                "proxy_request_duration_seconds",
                "Request handling latency in seconds, by method"
            );
            metrics::describe_counter!(
                "proxy_rejections_total",
                "Requests stopped before the upstream, by reason"
            );
            metrics::describe_counter!(
                "proxy_upstream_errors_total",
                "Upstream exchanges that failed or timed out"
            );
            metrics::describe_counter!(
                "proxy_alerts_total",
                "Rate cap crossings reported, by kind"
            );
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install metrics exporter");
        }
    }
}

/// Record a completed request: one counter tick and a latency sample.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request stopped by the pipeline before reaching the upstream.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("proxy_rejections_total", "reason" => reason).increment(1);
}

/// Record a failed upstream exchange (connect error, timeout, bad body).
pub fn record_upstream_error() {
    metrics::counter!("proxy_upstream_errors_total").increment(1);
}

/// Record a cap-crossing alert ("soft_cap" or "hard_cap").
pub fn record_alert(kind: &'static str) {
    metrics::counter!("proxy_alerts_total", "kind" => kind).increment(1);
}
