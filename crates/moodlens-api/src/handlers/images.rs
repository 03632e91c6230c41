//! Image analysis handlers.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::GenericImageView;
use moodlens_media::{annotate, decode_image, encode_image, MediaError, OutputFormat, RenderOptions};
use moodlens_models::{ImageReport, LocationResult, MediaKind};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::upload::Upload;
use crate::cache::{CacheKey, CachedAnalysis};
use crate::error::{ApiError, ApiResult};
use crate::history::HistoryEntry;
use crate::metrics;
use crate::security::{is_valid_id, parse_flag};
use crate::state::AppState;

/// Report plus the annotated image.
#[derive(Serialize)]
pub struct ImageAnalysisResponse {
    #[serde(flatten)]
    pub report: ImageReport,
    /// Base64-encoded annotated PNG
    pub annotated_image: String,
    /// Download path for the annotated PNG while it stays in the history
    pub annotated_url: String,
    /// Detection results came from the analysis cache
    pub cached: bool,
}

/// Analyze an uploaded image.
///
/// Multipart fields: `file` (jpg, jpeg or png) and optional `location=true`
/// to also guess where the photo was taken.
pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ImageAnalysisResponse>> {
    let upload = Upload::from_multipart(multipart).await?;
    upload.require_kind(MediaKind::Image)?;
    let want_location = upload.field("location").is_some_and(parse_flag);

    let bytes = upload.bytes.clone();
    let image = tokio::task::spawn_blocking(move || decode_image(&bytes)).await??;

    let taxonomy = state.analyzer.taxonomy();
    let key = CacheKey::new(&upload.bytes, taxonomy);
    let cached = state.cache.get(&key).await;
    metrics::record_cache_lookup(cached.is_some());

    let (image, analysis, from_cache) = match cached {
        Some(analysis) => {
            debug!(key = key.as_str(), "Analysis cache hit");
            (image, analysis, true)
        }
        None => {
            let analyzer = Arc::clone(&state.analyzer);
            let (image, analysis) = tokio::task::spawn_blocking(move || {
                let faces = analyzer.analyze(&image)?;
                let analysis = CachedAnalysis {
                    width: image.width(),
                    height: image.height(),
                    faces,
                };
                Ok::<_, MediaError>((image, analysis))
            })
            .await??;
            (image, state.cache.insert(key, analysis).await, false)
        }
    };

    let location = if want_location {
        let found = match &state.location {
            Some(detector) => detector.detect(&upload.bytes).await,
            None => LocationResult::unknown(),
        };
        metrics::record_location_lookup(found.source.as_str());
        Some(found)
    } else {
        None
    };

    let faces = analysis.faces.clone();
    let overlay = location.clone();
    let png = tokio::task::spawn_blocking(move || {
        let canvas = annotate(&image, &faces, overlay.as_ref(), &RenderOptions::default());
        encode_image(&canvas, OutputFormat::Png)
    })
    .await??;

    let id = Uuid::new_v4().to_string();
    let mut report = ImageReport::new(
        id.clone(),
        upload.filename.clone(),
        (analysis.width, analysis.height),
        taxonomy,
        analysis.faces.clone(),
    );
    report.location = location;

    info!(
        id = %id,
        filename = %report.filename,
        faces = report.face_count(),
        summary = %report.summary,
        cached = from_cache,
        "Image analyzed"
    );
    metrics::record_image_analyzed(report.face_count());

    let annotated_image = BASE64.encode(&png);
    state
        .history
        .push(HistoryEntry::image(&id, &report.filename, &report.summary, png))
        .await;

    Ok(Json(ImageAnalysisResponse {
        annotated_url: format!("/api/images/{}/annotated", id),
        report,
        annotated_image,
        cached: from_cache,
    }))
}

/// Download the annotated PNG of a recent analysis.
pub async fn get_annotated_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid analysis ID"));
    }

    let png = state
        .history
        .annotated(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Annotated image {} not found", id)))?;

    let disposition = format!("inline; filename=\"{}_annotated.png\"", id);
    Ok((
        [
            (header::CONTENT_TYPE, OutputFormat::Png.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(png.as_ref().clone()),
    )
        .into_response())
}
