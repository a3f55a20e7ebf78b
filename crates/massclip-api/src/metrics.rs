//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "massclip_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "massclip_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "massclip_http_requests_in_flight";

    // Purchases
    pub const PURCHASES_FULFILLED_TOTAL: &str = "massclip_purchases_fulfilled_total";
    pub const WEBHOOK_EVENTS_TOTAL: &str = "massclip_webhook_events_total";
    pub const ACCESS_GRANTS_TOTAL: &str = "massclip_access_grants_total";

    // Uploads
    pub const CHUNKED_FINALIZE_TOTAL: &str = "massclip_chunked_finalize_total";

    // Payout status cache
    pub const STATUS_CACHE_HITS_TOTAL: &str = "massclip_status_cache_hits_total";
    pub const STATUS_CACHE_MISSES_TOTAL: &str = "massclip_status_cache_misses_total";
    pub const STATUS_CACHE_WRITE_FAILURES_TOTAL: &str = "massclip_status_cache_write_failures_total";
    pub const STATUS_CACHE_WRITES_DROPPED_TOTAL: &str = "massclip_status_cache_writes_dropped_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "massclip_rate_limit_hits_total";
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

/// Record a purchase that produced new documents.
pub fn record_purchase_fulfilled(source: &str, grants: usize) {
    counter!(names::PURCHASES_FULFILLED_TOTAL, "source" => source.to_string()).increment(1);
    counter!(names::ACCESS_GRANTS_TOTAL).increment(grants as u64);
}

/// Record the outcome of one webhook delivery.
pub fn record_webhook_event(event_type: &str, outcome: &str) {
    let labels = [
        ("type", event_type.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::WEBHOOK_EVENTS_TOTAL, &labels).increment(1);
}

pub fn record_finalize(outcome: &str) {
    counter!(names::CHUNKED_FINALIZE_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_status_cache(hit: bool) {
    if hit {
        counter!(names::STATUS_CACHE_HITS_TOTAL).increment(1);
    } else {
        counter!(names::STATUS_CACHE_MISSES_TOTAL).increment(1);
    }
}

pub fn record_status_cache_write_failure() {
    counter!(names::STATUS_CACHE_WRITE_FAILURES_TOTAL).increment(1);
}

pub fn record_status_cache_write_dropped() {
    counter!(names::STATUS_CACHE_WRITES_DROPPED_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static ID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    // Generated ids, gateway ids (cs_..., acct_...) and numeric segments
    Regex::new(r"/([0-9a-f]{32}|[a-z]{2,5}_[A-Za-z0-9_]+|[0-9]+)(/|$)").expect("valid regex")
});

static NAMED_RESOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(bundles|chunked|free-content|profile|access)/[A-Za-z0-9_-]+").expect("valid regex")
});

/// Collapse ids in a path so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let path = NAMED_RESOURCE.replace_all(path, "/$1/:id");
    let path = ID_SEGMENT.replace_all(&path, "/:id$2");
    // A second pass catches adjacent id segments the first one skipped.
    ID_SEGMENT.replace_all(&path, "/:id$2").to_string()
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
            sanitize_path("/api/creator/bundles/9f86d081884c7d659a2feaa0c55ad015/content"),
            "/api/creator/bundles/:id/content"
        );
        assert_eq!(
            sanitize_path("/api/uploads/chunked/abc/chunks/3"),
            "/api/uploads/chunked/:id/chunks/:id"
        );
        assert_eq!(sanitize_path("/api/purchase/verify"), "/api/purchase/verify");
    }
}
