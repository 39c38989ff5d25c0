//! Metadata handlers.

use axum::extract::{Path, State};
use axum::Json;

use shorts_models::{Metadata, MetadataBulkCreate, MetadataCreate, MetadataId};

use crate::error::{ApiJson, ApiResult};
use crate::handlers::MessageResponse;
use crate::state::AppState;

pub async fn create_metadata(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MetadataCreate>,
) -> ApiResult<Json<Metadata>> {
    Ok(Json(state.queue.create_metadata(request).await?))
}

/// Create many records at once, numbered in request order.
pub async fn create_metadata_bulk(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MetadataBulkCreate>,
) -> ApiResult<Json<MessageResponse>> {
    let created = state.queue.create_metadata_bulk(request).await?;
    Ok(Json(MessageResponse::new(format!(
        "Created {} metadata entries",
        created.len()
    ))))
}

pub async fn list_metadata(State(state): State<AppState>) -> ApiResult<Json<Vec<Metadata>>> {
    Ok(Json(state.queue.list_metadata().await?))
}

pub async fn list_unused_metadata(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Metadata>>> {
    Ok(Json(state.queue.list_unused_metadata().await?))
}

pub async fn delete_metadata(
    State(state): State<AppState>,
    Path(metadata_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .queue
        .delete_metadata(&MetadataId::from_string(metadata_id))
        .await?;
    Ok(Json(MessageResponse::new("Metadata deleted successfully")))
}
