//! Video upload and listing handlers.

use std::time::Instant;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use shorts_models::{Video, VideoId};
use shorts_storage::StorageError;

use crate::error::{ApiError, ApiResult};
use crate::handlers::MessageResponse;
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the video file.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub video_id: VideoId,
}

/// Stream a multipart upload to disk and register it as a video.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let start = Instant::now();

    let field = loop {
        match multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            Some(field) if field.name() == Some(FILE_FIELD) => break field,
            Some(_) => continue,
            None => return Err(StorageError::EmptyFilename.into()),
        }
    };
    let filename = field.file_name().unwrap_or_default().to_string();
    if filename.is_empty() {
        return Err(StorageError::EmptyFilename.into());
    }

    let stored = match state.uploads.store_stream(&filename, field).await {
        Ok(stored) => stored,
        Err(e) => {
            let outcome = if e.is_client_error() { "rejected" } else { "failed" };
            metrics::record_upload(outcome, 0, start.elapsed().as_secs_f64());
            return Err(e.into());
        }
    };

    let file_path = stored.path.display().to_string();
    let video = match state
        .queue
        .register_video(
            VideoId::from_string(stored.id.as_str()),
            &stored.filename,
            &file_path,
            stored.size,
        )
        .await
    {
        Ok(video) => video,
        Err(e) => {
            if let Err(rm) = state.uploads.delete(&stored.path).await {
                warn!(path = %file_path, error = %rm, "Failed to remove orphaned upload");
            }
            metrics::record_upload("failed", 0, start.elapsed().as_secs_f64());
            return Err(e.into());
        }
    };

    metrics::record_upload("stored", stored.size, start.elapsed().as_secs_f64());
    Ok(Json(UploadResponse {
        message: "Video uploaded successfully".to_string(),
        video_id: video.id,
    }))
}

/// All videos ordered by upload sequence.
pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<Video>>> {
    Ok(Json(state.queue.list_videos().await?))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Video>> {
    Ok(Json(
        state.queue.get_video(&VideoId::from_string(video_id)).await?,
    ))
}

/// Delete the record, then its file.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let video = state
        .queue
        .delete_video(&VideoId::from_string(video_id))
        .await?;

    match state.uploads.delete(&video.file_path).await {
        Ok(true) => {}
        Ok(false) => info!(video_id = %video.id, "Video file was already gone"),
        Err(e) => warn!(video_id = %video.id, error = %e, "Failed to remove video file"),
    }

    Ok(Json(MessageResponse::new("Video deleted successfully")))
}
