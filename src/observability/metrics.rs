//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (request count, latency)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - The Prometheus recorder is installed at most once per process
//! - Route labels use the matched template (`/api/users/{id}`), never the raw path
//! - Histogram buckets tuned for typical web latencies

use std::sync::OnceLock;
use std::time::Instant;

use metrics::Label;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE.get_or_init(install).clone()
}

fn install() -> PrometheusHandle {
    let builder = match PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)
    {
        Ok(builder) => builder,
        Err(_) => PrometheusBuilder::new(),
    };

    let handle = match builder.install_recorder() {
        Ok(handle) => handle,
        // Another recorder owns the process; render an empty registry.
        Err(_) => PrometheusBuilder::new().build_recorder().handle(),
    };

    metrics::describe_counter!(REQUESTS_TOTAL, "Total HTTP requests handled");
    metrics::describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    handle
}

/// Render the current registry in the Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.run_upkeep();
    handle.render()
}

/// Record one completed request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("path", route.to_string()),
        Label::new("status", status.to_string()),
    ];
    metrics::counter!(REQUESTS_TOTAL, labels.clone()).increment(1);
    metrics::histogram!(REQUEST_DURATION, labels).record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_requests_appear_in_exposition() {
        let handle = init_metrics();
        record_request("GET", "/api/metrics-test", 200, Instant::now());

        let text = render(&handle);
        assert!(text.contains(REQUESTS_TOTAL));
        assert!(text.contains("path=\"/api/metrics-test\""));
    }

    #[test]
    fn init_is_idempotent() {
        let first = init_metrics();
        let second = init_metrics();
        record_request("DELETE", "/api/idempotent", 200, Instant::now());
        assert!(render(&first).contains("/api/idempotent"));
        assert!(render(&second).contains("/api/idempotent"));
    }
}
