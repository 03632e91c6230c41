//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::handlers::{
    analyze_image, get_annotated_image, get_job, health, index, list_history, ready,
    start_video_job, stop_job,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit, request_logging, security_headers, ClientRateLimiter, X_REQUEST_ID,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(ClientRateLimiter::new(state.config.rate_limit_rps));
    let max_body_size = state.config.max_body_size;

    let api_routes = Router::new()
        .route("/images", post(analyze_image))
        .route("/images/:id/annotated", get(get_annotated_image))
        .route("/history", get(list_history))
        .route("/videos", post(start_video_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/stop", post(stop_job))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit));

    let mut router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready))
        .nest("/api", api_routes);

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || async move { handle.render() }));
    }

    router
        // Multipart uploads are capped by the limit layer, not axum's 2MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
