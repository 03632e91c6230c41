//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use moodlens_media::check_ffmpeg;
use moodlens_models::RegionKind;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub detector: CheckStatus,
    pub ffmpeg: CheckStatus,
    pub location: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckStatus {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            detail: Some(detail.into()),
        }
    }

    fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            detail: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            detail: Some(msg.into()),
        }
    }
}

/// Readiness check endpoint (readiness probe).
///
/// Images only need the detectors, which are loaded before the server
/// starts. A missing ffmpeg reports `degraded` since video jobs would fail.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let detector = CheckStatus::ok(format!(
        "{} ({})",
        state.analysis.detector_backend,
        state.analyzer.cascades().detector(RegionKind::Face).name()
    ));

    let ffmpeg = match tokio::task::spawn_blocking(check_ffmpeg).await {
        Ok(Ok(path)) => CheckStatus::ok(path.display().to_string()),
        Ok(Err(e)) => CheckStatus::error(e.to_string()),
        Err(e) => CheckStatus::error(e.to_string()),
    };

    let location = if state.location.is_some() {
        CheckStatus::ok("google vision")
    } else {
        CheckStatus::disabled()
    };

    let status = if ffmpeg.status == "ok" { "ready" } else { "degraded" };

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: status.to_string(),
            checks: ReadinessChecks {
                detector,
                ffmpeg,
                location,
            },
        }),
    )
}
