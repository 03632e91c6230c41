//! Video job handlers.

use std::io::Write;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use moodlens_models::{JobId, JobState, MediaKind, VideoJobStatus};
use serde::Serialize;
use tracing::info;

use super::upload::Upload;
use crate::error::{ApiError, ApiResult};
use crate::jobs::VideoJob;
use crate::metrics;
use crate::security::is_valid_id;
use crate::state::AppState;

/// Largest accepted `frame_skip`.
pub const MAX_FRAME_SKIP: u32 = 1000;

#[derive(Serialize)]
pub struct JobAccepted {
    pub job_id: JobId,
    pub state: JobState,
    pub status_url: String,
}

#[derive(Serialize)]
pub struct StopResponse {
    pub job_id: JobId,
    pub state: JobState,
}

/// Start analyzing an uploaded video.
///
/// Multipart fields: `file` (mp4 or avi) and optional `frame_skip` to
/// analyze every Nth frame. Returns 202 with the job ID to poll.
pub async fn start_video_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let upload = Upload::from_multipart(multipart).await?;
    upload.require_kind(MediaKind::Video)?;

    let frame_skip = match upload.field("frame_skip").map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_FRAME_SKIP).contains(n))
                .ok_or_else(|| {
                    ApiError::bad_request(format!("frame_skip must be between 1 and {}", MAX_FRAME_SKIP))
                })?,
        ),
        None => None,
    };
    let options = state.sample_options(frame_skip);

    // ffmpeg reads from a path, so spool the upload to a temp file that
    // lives as long as the job.
    let bytes = upload.bytes.clone();
    let suffix = format!(".{}", extension(&upload.filename));
    let spooled = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
        let mut file = tempfile::Builder::new()
            .prefix("moodlens-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(file)
    })
    .await?
    .map_err(|e| ApiError::internal(format!("Could not store upload: {}", e)))?;

    let (id, cancel_rx) = state
        .jobs
        .create(&upload.filename, state.analyzer.taxonomy(), options.frame_skip)
        .await;

    let job = VideoJob {
        id: id.clone(),
        filename: upload.filename.clone(),
        options,
        analyzer: state.analyzer.clone(),
        jobs: state.jobs.clone(),
        history: state.history.clone(),
    };
    tokio::spawn(job.run(spooled, cancel_rx));

    info!(
        job_id = %id,
        filename = %upload.filename,
        frame_skip = options.frame_skip,
        "Video job queued"
    );
    metrics::record_job_started();

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            status_url: format!("/api/jobs/{}", id),
            job_id: id,
            state: JobState::Queued,
        }),
    ))
}

/// Job status with the report so far.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoJobStatus>> {
    let id = parse_job_id(id)?;
    state
        .jobs
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job {} not found", id)))
}

/// Stop a queued or running job. Frames analyzed so far stay in the report.
pub async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StopResponse>> {
    let id = parse_job_id(id)?;
    let job_state = state.jobs.stop(&id).await?;
    info!(job_id = %id, state = %job_state, "Stop requested");
    Ok(Json(StopResponse {
        job_id: id,
        state: job_state,
    }))
}

fn parse_job_id(id: String) -> ApiResult<JobId> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid job ID"));
    }
    Ok(JobId::from_string(id))
}

fn extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
        .to_lowercase()
}
