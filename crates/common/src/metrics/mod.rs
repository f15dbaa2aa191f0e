//! Metrics and observability utilities
//!
//! Prometheus metrics for HTTP requests, remote store calls, tolerated
//! enrichment failures and authentication failures.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::{Duration, Instant};

/// Metrics prefix for all Quote Table metrics
pub const METRICS_PREFIX: &str = "quotetable";

/// Histogram buckets for request and store latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_store_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Remote store calls by table, operation and outcome"
    );

    describe_histogram!(
        format!("{}_store_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Remote store call latency in seconds"
    );

    describe_counter!(
        format!("{}_enrichment_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Per-row enrichment failures that were downgraded instead of failing the list"
    );

    describe_counter!(
        format!("{}_auth_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Failed authentication and password verification attempts"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one remote store call
pub fn record_store_request(table: &str, op: &'static str, duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_store_requests_total", METRICS_PREFIX),
        "table" => table.to_string(),
        "op" => op,
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_store_duration_seconds", METRICS_PREFIX),
        "table" => table.to_string(),
        "op" => op
    )
    .record(duration.as_secs_f64());
}

/// Record a downgraded enrichment (`author`, `book`)
pub fn record_enrichment_failure(kind: &'static str) {
    counter!(
        format!("{}_enrichment_failures_total", METRICS_PREFIX),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_auth_failure(flow: &'static str) {
    counter!(
        format!("{}_auth_failures_total", METRICS_PREFIX),
        "flow" => flow
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // no recorder installed: calls are no-ops
        RequestMetrics::start("GET", "/quotes").finish(200);
        record_store_request("quotes", "select", Duration::from_millis(3), true);
        record_enrichment_failure("author");
        record_auth_failure("login");
    }
}
