//! Prometheus metrics for the BFF.
//!
//! Metrics are exposed via a dedicated HTTP listener when `METRICS_PORT` is
//! non-zero. Recording functions are no-ops until the exporter is installed.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `bff_proxy_requests_total` - Proxied requests (labels: prefix, method, status)
//! - `bff_upstream_failures_total` - Failed upstream calls (labels: prefix, kind)
//! - `bff_csrf_rejections_total` - Requests rejected by the CSRF check (label: method)
//! - `bff_sessions_created_total` - Sessions created
//!
//! ## Histograms
//! - `bff_upstream_duration_seconds` - Upstream round trip (label: prefix)
//!
//! ## Gauges
//! - `bff_active_sessions` - Live sessions after the last sweep

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const PROXY_REQUESTS_TOTAL: &str = "bff_proxy_requests_total";
    pub const UPSTREAM_FAILURES_TOTAL: &str = "bff_upstream_failures_total";
    pub const CSRF_REJECTIONS_TOTAL: &str = "bff_csrf_rejections_total";
    pub const SESSIONS_CREATED_TOTAL: &str = "bff_sessions_created_total";
    pub const UPSTREAM_DURATION_SECONDS: &str = "bff_upstream_duration_seconds";
    pub const ACTIVE_SESSIONS: &str = "bff_active_sessions";
}

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed, e.g. because the
/// listener address is taken or a recorder is already set.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::PROXY_REQUESTS_TOTAL,
        "Total number of requests forwarded to the upstream API"
    );
    describe_counter!(
        names::UPSTREAM_FAILURES_TOTAL,
        "Total number of failed upstream calls"
    );
    describe_counter!(
        names::CSRF_REJECTIONS_TOTAL,
        "Total number of requests rejected for a missing or invalid CSRF token"
    );
    describe_counter!(
        names::SESSIONS_CREATED_TOTAL,
        "Total number of sessions created"
    );

    describe_histogram!(
        names::UPSTREAM_DURATION_SECONDS,
        "Upstream round trip duration in seconds"
    );

    describe_gauge!(
        names::ACTIVE_SESSIONS,
        "Number of live sessions after the last expiry sweep"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one proxied request and the status returned to the client.
pub fn record_proxied_request(prefix: &str, method: &str, status: &str) {
    counter!(names::PROXY_REQUESTS_TOTAL, "prefix" => prefix.to_string(), "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a failed upstream call.
pub fn record_upstream_failure(prefix: &str, kind: &'static str) {
    counter!(names::UPSTREAM_FAILURES_TOTAL, "prefix" => prefix.to_string(), "kind" => kind)
        .increment(1);
}

/// Record a CSRF rejection.
pub fn record_csrf_rejection(method: &str) {
    counter!(names::CSRF_REJECTIONS_TOTAL, "method" => method.to_string()).increment(1);
}

pub fn record_session_created() {
    counter!(names::SESSIONS_CREATED_TOTAL).increment(1);
}

/// Record the upstream round trip of a successful call.
pub fn record_upstream_duration(prefix: &str, duration_secs: f64) {
    histogram!(names::UPSTREAM_DURATION_SECONDS, "prefix" => prefix.to_string())
        .record(duration_secs);
}

/// Update the live session gauge.
pub fn set_active_sessions(count: usize) {
    // Precision loss only past 2^52 sessions.
    #[allow(clippy::cast_precision_loss)]
    gauge!(names::ACTIVE_SESSIONS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only check that recording without an installed exporter is safe.

    #[test]
    fn test_record_proxied_request() {
        record_proxied_request("/pets", "GET", "200");
        record_upstream_duration("/pets", 0.012);
    }

    #[test]
    fn test_record_failures_and_rejections() {
        record_upstream_failure("/pets", "timeout");
        record_csrf_rejection("POST");
        record_session_created();
    }

    #[test]
    fn test_set_active_sessions() {
        set_active_sessions(0);
        set_active_sessions(42);
    }
}
