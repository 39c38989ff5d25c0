//! Dashboard handler.

use axum::extract::State;
use axum::Json;

use shorts_models::DashboardStats;

use crate::error::ApiResult;
use crate::state::AppState;

/// Video, queue and metadata counts.
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.queue.dashboard_stats().await?))
}
