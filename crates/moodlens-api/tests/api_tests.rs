//! API integration tests.
//!
//! The router runs against stub detectors so results are deterministic and
//! no cascade files are needed.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::RgbImage;
use serde_json::Value;
use tower::ServiceExt;

use moodlens_api::{create_router, AnalysisConfig, ApiConfig, AppState};
use moodlens_media::{
    encode_image, CascadeSet, EmotionClassifier, FaceAnalyzer, OutputFormat, RegionDetector,
    StaticDetector,
};
use moodlens_models::{Rect, Taxonomy};

const BOUNDARY: &str = "moodlens-test-boundary";

fn analyzer(faces: Vec<Rect>, eyes: Vec<Rect>, smiles: Vec<Rect>) -> FaceAnalyzer {
    let cascades = CascadeSet::new(
        Arc::new(StaticDetector::new(faces)) as Arc<dyn RegionDetector>,
        Arc::new(StaticDetector::new(eyes)),
        Arc::new(StaticDetector::new(smiles)),
    );
    FaceAnalyzer::new(cascades, EmotionClassifier::new(Taxonomy::Basic))
}

fn router_with(config: ApiConfig, analyzer: FaceAnalyzer) -> Router {
    let state = AppState::with_analyzer(config, AnalysisConfig::default(), analyzer, None);
    create_router(state, None)
}

/// One 200x200 face whose eyes sit high enough to read as angry.
fn angry_router() -> Router {
    router_with(
        ApiConfig::default(),
        analyzer(
            vec![Rect::new(10, 10, 200, 200)],
            vec![Rect::new(30, 15, 50, 50), Rect::new(110, 15, 50, 50)],
            vec![],
        ),
    )
}

fn empty_router() -> Router {
    router_with(ApiConfig::default(), analyzer(vec![], vec![], vec![]))
}

fn png(width: u32, height: u32) -> Vec<u8> {
    encode_image(&RgbImage::new(width, height), OutputFormat::Png).unwrap()
}

/// Build a multipart body: `file` plus plain text fields.
fn multipart(filename: &str, bytes: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = empty_router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/healthz")
        .header("X-Request-ID", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = empty_router().oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
}

#[tokio::test]
async fn test_ready_reports_detector() {
    let response = empty_router().oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["checks"]["detector"]["status"], "ok");
    assert_eq!(body["checks"]["location"]["status"], "disabled");
    assert!(body["status"] == "ready" || body["status"] == "degraded");
}

#[tokio::test]
async fn test_index_page() {
    let response = empty_router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let response = empty_router().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analyze_image_classifies_faces() {
    let app = angry_router();
    let body = multipart("portrait.png", &png(240, 240), &[]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/images", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = json(response).await;
    assert_eq!(report["filename"], "portrait.png");
    assert_eq!(report["width"], 240);
    assert_eq!(report["summary"], "1 Angry");
    assert_eq!(report["counts"]["angry"], 1);
    assert_eq!(report["faces"][0]["emotion"], "angry");
    assert_eq!(report["faces"][0]["eyes"].as_array().unwrap().len(), 2);
    assert_eq!(report["cached"], false);
    assert!(report.get("location").is_none());
    assert!(!report["annotated_image"].as_str().unwrap().is_empty());

    // The annotated PNG stays downloadable
    let url = report["annotated_url"].as_str().unwrap().to_string();
    let response = app.oneshot(get(&url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}

#[tokio::test]
async fn test_no_faces_is_not_an_error() {
    let body = multipart("empty.jpg", &png(64, 64), &[]);
    let response = empty_router()
        .oneshot(upload_request("/api/images", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = json(response).await;
    assert_eq!(report["summary"], "No faces detected");
    assert!(report["faces"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_repeat_upload_hits_cache() {
    let app = angry_router();
    let image = png(240, 240);

    let first = app
        .clone()
        .oneshot(upload_request("/api/images", multipart("a.png", &image, &[])))
        .await
        .unwrap();
    assert_eq!(json(first).await["cached"], false);

    let second = app
        .oneshot(upload_request("/api/images", multipart("b.png", &image, &[])))
        .await
        .unwrap();
    let report = json(second).await;
    assert_eq!(report["cached"], true);
    assert_eq!(report["filename"], "b.png");
    assert_eq!(report["summary"], "1 Angry");
}

#[tokio::test]
async fn test_location_without_api_key_is_unknown() {
    let body = multipart("trip.png", &png(32, 32), &[("location", "true")]);
    let response = empty_router()
        .oneshot(upload_request("/api/images", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = json(response).await;
    assert_eq!(report["location"]["description"], "unknown");
    assert_eq!(report["location"]["source"], "unknown");
}

#[tokio::test]
async fn test_unsupported_extension_rejected() {
    let body = multipart("anim.gif", &png(8, 8), &[]);
    let response = empty_router()
        .oneshot(upload_request("/api/images", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_undecodable_image_is_processing_error() {
    let body = multipart("broken.png", b"definitely not a png", &[]);
    let response = empty_router()
        .oneshot(upload_request("/api/images", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json(response).await;
    assert!(body["detail"].as_str().unwrap().starts_with("Processing error"));
}

#[tokio::test]
async fn test_missing_file_field() {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"location\"\r\n\r\ntrue\r\n--{BOUNDARY}--\r\n")
            .as_bytes(),
    );
    let response = empty_router()
        .oneshot(upload_request("/api/images", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_lists_recent_uploads() {
    let app = empty_router();
    for name in ["one.png", "two.png"] {
        let response = app
            .clone()
            .oneshot(upload_request("/api/images", multipart(name, &png(16, 16), &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/api/history?limit=1")).await.unwrap();
    let entries = json(response).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["filename"], "two.png");
    assert_eq!(entries[0]["kind"], "image");
    assert_eq!(entries[0]["has_annotated"], true);
}

#[tokio::test]
async fn test_unknown_annotated_image() {
    let response = empty_router()
        .oneshot(get("/api/images/550e8400-e29b-41d4-a716-446655440000/annotated"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_video_upload_creates_job() {
    let app = empty_router();
    let body = multipart("clip.mp4", b"not really a video", &[("frame_skip", "10")]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/videos", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let accepted = json(response).await;
    assert_eq!(accepted["state"], "queued");
    let status_url = accepted["status_url"].as_str().unwrap().to_string();

    let response = app.oneshot(get(&status_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job = json(response).await;
    assert_eq!(job["filename"], "clip.mp4");
    assert_eq!(job["report"]["frame_skip"], 10);
    let state = job["state"].as_str().unwrap();
    assert!(["queued", "running", "failed"].contains(&state), "state {}", state);
}

#[tokio::test]
async fn test_video_rejects_bad_frame_skip() {
    let body = multipart("clip.avi", b"data", &[("frame_skip", "0")]);
    let response = empty_router()
        .oneshot(upload_request("/api/videos", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_sent_to_video_endpoint() {
    let body = multipart("photo.png", &png(8, 8), &[]);
    let response = empty_router()
        .oneshot(upload_request("/api/videos", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_unknown_job() {
    let app = empty_router();
    let id = "00000000-0000-0000-0000-000000000000";

    let response = app
        .clone()
        .oneshot(get(&format!("/api/jobs/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stop = Request::builder()
        .method("POST")
        .uri(format!("/api/jobs/{}/stop", id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(stop).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/api/jobs/bad")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_limiting_per_client() {
    let config = ApiConfig {
        rate_limit_rps: 1,
        ..ApiConfig::default()
    };
    let app = router_with(config, analyzer(vec![], vec![], vec![]));

    let request = || {
        Request::builder()
            .uri("/api/history")
            .header("X-Forwarded-For", "192.168.1.100")
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));
}
