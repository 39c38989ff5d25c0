//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle used by `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "shorts_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "shorts_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "shorts_http_requests_in_flight";

    // Uploads
    pub const UPLOADS_TOTAL: &str = "shorts_uploads_total";
    pub const UPLOAD_BYTES_TOTAL: &str = "shorts_upload_bytes_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "shorts_upload_duration_seconds";

    // Queue
    pub const QUEUE_ADMISSIONS_TOTAL: &str = "shorts_queue_admissions_total";
    pub const BATCH_SCHEDULED_ENTRIES: &str = "shorts_batch_scheduled_entries";
    pub const QUEUE_STATUS_CHANGES_TOTAL: &str = "shorts_queue_status_changes_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "shorts_rate_limit_hits_total";
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

/// Record an upload attempt. `outcome` is `stored`, `rejected` or `failed`.
pub fn record_upload(outcome: &str, bytes: u64, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
    if bytes > 0 {
        counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
    }
    histogram!(names::UPLOAD_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record queue entries created. `mode` is `single` or `sequential`.
pub fn record_queue_admissions(mode: &str, interval: &str, count: usize) {
    let labels = [
        ("mode", mode.to_string()),
        ("interval", interval.to_string()),
    ];
    counter!(names::QUEUE_ADMISSIONS_TOTAL, &labels).increment(count as u64);
}

/// Record the size of a sequential batch.
pub fn record_batch_size(count: usize) {
    histogram!(names::BATCH_SCHEDULED_ENTRIES).record(count as f64);
}

pub fn record_status_change(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::QUEUE_STATUS_CHANGES_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collections whose next path segment is a record id, with the fixed
/// sub-routes that must be kept as-is.
const ID_COLLECTIONS: [(&str, &[&str]); 4] = [
    ("videos", &["upload"]),
    ("metadata", &["bulk", "unused"]),
    ("queue", &["pending", "sequential"]),
    ("configs", &["active"]),
];

/// Sanitize path for metrics labels (replace record ids with `:id`).
fn sanitize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut out = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let is_id = i > 0
            && !segment.is_empty()
            && ID_COLLECTIONS
                .iter()
                .any(|(collection, fixed)| segments[i - 1] == *collection && !fixed.contains(segment));
        out.push(if is_id { ":id" } else { *segment });
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

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/videos/550e8400-e29b-41d4-a716-446655440000"),
            "/api/videos/:id"
        );
        assert_eq!(sanitize_path("/api/queue/abc/status"), "/api/queue/:id/status");
        assert_eq!(sanitize_path("/api/configs/xyz"), "/api/configs/:id");
    }

    #[test]
    fn test_sanitize_path_keeps_fixed_routes() {
        assert_eq!(sanitize_path("/api/videos/upload"), "/api/videos/upload");
        assert_eq!(sanitize_path("/api/metadata/unused"), "/api/metadata/unused");
        assert_eq!(sanitize_path("/api/queue/sequential"), "/api/queue/sequential");
        assert_eq!(sanitize_path("/api/configs/active"), "/api/configs/active");
        assert_eq!(sanitize_path("/api/"), "/api/");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
