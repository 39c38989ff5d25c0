//! Upload queue handlers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;

use shorts_models::{
    QueueEntry, QueueEntryCreate, QueueEntryId, QueueStatusUpdate, SequentialScheduleRequest,
    SequentialScheduleResponse,
};

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::handlers::MessageResponse;
use crate::metrics;
use crate::state::AppState;

/// Queue one video with one metadata record.
pub async fn add_to_queue(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QueueEntryCreate>,
) -> ApiResult<Json<QueueEntry>> {
    let entry = state.queue.admit(request).await?;
    metrics::record_queue_admissions("single", entry.schedule_interval.as_str(), 1);
    Ok(Json(entry))
}

/// Pair videos and unused metadata in sequence order and queue them.
///
/// An empty body schedules everything immediately from the first item.
pub async fn schedule_sequential(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SequentialScheduleResponse>> {
    let request: SequentialScheduleRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SequentialScheduleRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };
    let interval = request.schedule_interval;

    let response = state.queue.schedule_sequential(request).await?;

    metrics::record_queue_admissions("sequential", interval.as_str(), response.scheduled_count);
    metrics::record_batch_size(response.scheduled_count);
    Ok(Json(response))
}

/// All entries by scheduled time.
pub async fn list_queue(State(state): State<AppState>) -> ApiResult<Json<Vec<QueueEntry>>> {
    Ok(Json(state.queue.list_queue().await?))
}

pub async fn list_pending(State(state): State<AppState>) -> ApiResult<Json<Vec<QueueEntry>>> {
    Ok(Json(state.queue.list_pending().await?))
}

pub async fn update_queue_status(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
    ApiJson(update): ApiJson<QueueStatusUpdate>,
) -> ApiResult<Json<QueueEntry>> {
    let entry = state
        .queue
        .update_queue_status(&QueueEntryId::from_string(queue_id), update.status)
        .await?;
    metrics::record_status_change(entry.status.as_str());
    Ok(Json(entry))
}

pub async fn delete_queue_entry(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .queue
        .delete_queue_entry(&QueueEntryId::from_string(queue_id))
        .await?;
    Ok(Json(MessageResponse::new("Queue entry deleted successfully")))
}
