//! Publishing configuration handlers. Secrets are always masked.

use axum::extract::{Path, State};
use axum::Json;

use shorts_models::{ApiConfigurationInput, ApiConfigurationView, ConfigId};

use crate::error::{ApiJson, ApiResult};
use crate::handlers::MessageResponse;
use crate::state::AppState;

pub async fn list_configs(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ApiConfigurationView>>> {
    let configs = state.queue.list_configurations().await?;
    Ok(Json(configs.iter().map(ApiConfigurationView::from).collect()))
}

pub async fn get_active_config(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiConfigurationView>> {
    let config = state.queue.active_configuration().await?;
    Ok(Json(ApiConfigurationView::from(&config)))
}

/// Store a configuration and make it the active one.
pub async fn create_config(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ApiConfigurationInput>,
) -> ApiResult<Json<ApiConfigurationView>> {
    let config = state.queue.create_configuration(input).await?;
    Ok(Json(ApiConfigurationView::from(&config)))
}

/// Replace a configuration and make it the active one.
pub async fn update_config(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    ApiJson(input): ApiJson<ApiConfigurationInput>,
) -> ApiResult<Json<ApiConfigurationView>> {
    let config = state
        .queue
        .update_configuration(&ConfigId::from_string(config_id), input)
        .await?;
    Ok(Json(ApiConfigurationView::from(&config)))
}

pub async fn delete_config(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .queue
        .delete_configuration(&ConfigId::from_string(config_id))
        .await?;
    Ok(Json(MessageResponse::new("Configuration deleted successfully")))
}
