//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vdet_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vdet_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vdet_http_requests_in_flight";

    // Upload / inference queue metrics
    pub const UPLOAD_BYTES: &str = "vdet_upload_bytes";
    pub const INFERENCE_QUEUE_WAIT_SECONDS: &str = "vdet_inference_queue_wait_seconds";
    pub const ALERTS_RECEIVED_TOTAL: &str = "vdet_alerts_received_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vdet_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the size of a saved upload.
pub fn record_upload(bytes: u64) {
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Record how long a request waited for an inference permit.
pub fn record_queue_wait(model: &str, wait_secs: f64) {
    let labels = [("model", model.to_string())];
    histogram!(names::INFERENCE_QUEUE_WAIT_SECONDS, &labels).record(wait_secs);
}

pub fn record_alert_received() {
    counter!(names::ALERTS_RECEIVED_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels.
///
/// Numeric ids and annotated file names are replaced with placeholders so
/// label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut out = Vec::new();
    let mut previous = "";
    for segment in path.split('/') {
        let mapped = if previous == "annotated" && !segment.is_empty() {
            ":filename"
        } else if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            ":id"
        } else {
            segment
        };
        out.push(mapped);
        previous = segment;
    }
    out.join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
