//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "moodlens_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "moodlens_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "moodlens_http_requests_in_flight";

    // Analysis metrics
    pub const IMAGES_ANALYZED_TOTAL: &str = "moodlens_images_analyzed_total";
    pub const CACHE_LOOKUPS_TOTAL: &str = "moodlens_cache_lookups_total";
    pub const LOCATION_LOOKUPS_TOTAL: &str = "moodlens_location_lookups_total";

    // Video job metrics
    pub const VIDEO_JOBS_STARTED_TOTAL: &str = "moodlens_video_jobs_started_total";
    pub const VIDEO_JOBS_FINISHED_TOTAL: &str = "moodlens_video_jobs_finished_total";
    pub const VIDEO_FRAMES_ANALYZED_TOTAL: &str = "moodlens_video_frames_analyzed_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "moodlens_rate_limit_hits_total";
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

/// Record an analyzed image.
pub fn record_image_analyzed(faces: usize) {
    let labels = [("with_faces", (faces > 0).to_string())];
    counter!(names::IMAGES_ANALYZED_TOTAL, &labels).increment(1);
}

/// Record an analysis cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let labels = [("result", if hit { "hit" } else { "miss" }.to_string())];
    counter!(names::CACHE_LOOKUPS_TOTAL, &labels).increment(1);
}

/// Record a location lookup by the step that answered it.
pub fn record_location_lookup(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::LOCATION_LOOKUPS_TOTAL, &labels).increment(1);
}

pub fn record_job_started() {
    counter!(names::VIDEO_JOBS_STARTED_TOTAL).increment(1);
}

/// Record a job reaching a terminal state.
pub fn record_job_finished(state: &str) {
    let labels = [("state", state.to_string())];
    counter!(names::VIDEO_JOBS_FINISHED_TOTAL, &labels).increment(1);
}

pub fn record_frame_analyzed() {
    counter!(names::VIDEO_FRAMES_ANALYZED_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});
static ID_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(images|jobs)/[a-zA-Z0-9_-]+").unwrap());

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = UUID_RE.replace_all(path, ":id");
    let path = ID_SEGMENT_RE.replace_all(&path, "/$1/:id");
    path.to_string()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/images/550e8400-e29b-41d4-a716-446655440000/annotated"),
            "/api/images/:id/annotated"
        );
        assert_eq!(sanitize_path("/api/jobs/abc123/stop"), "/api/jobs/:id/stop");
        assert_eq!(sanitize_path("/api/history"), "/api/history");
    }
}
