//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, patch, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    add_to_queue, create_config, create_metadata, create_metadata_bulk, dashboard_stats,
    delete_config, delete_metadata, delete_queue_entry, delete_video, get_active_config,
    get_video, health, list_configs, list_metadata, list_pending, list_queue,
    list_unused_metadata, list_videos, ready, root, schedule_sequential, update_config,
    update_queue_status, upload_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // The storage layer enforces the upload ceiling while streaming.
    let upload_routes = Router::new()
        .route("/videos/upload", post(upload_video))
        .layer(DefaultBodyLimit::disable());

    let video_routes = Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/:video_id", get(get_video).delete(delete_video));

    let metadata_routes = Router::new()
        .route("/metadata", get(list_metadata).post(create_metadata))
        .route("/metadata/bulk", post(create_metadata_bulk))
        .route("/metadata/unused", get(list_unused_metadata))
        .route("/metadata/:metadata_id", axum::routing::delete(delete_metadata));

    let queue_routes = Router::new()
        .route("/queue", get(list_queue).post(add_to_queue))
        .route("/queue/sequential", post(schedule_sequential))
        .route("/queue/pending", get(list_pending))
        .route("/queue/:queue_id/status", patch(update_queue_status))
        .route("/queue/:queue_id", axum::routing::delete(delete_queue_entry));

    let config_routes = Router::new()
        .route("/configs", get(list_configs).post(create_config))
        .route("/configs/active", get(get_active_config))
        .route("/configs/:config_id", put(update_config).delete(delete_config));

    let mut api_routes = Router::new()
        .route("/", get(root))
        .route("/dashboard/stats", get(dashboard_stats))
        .merge(upload_routes)
        .merge(video_routes)
        .merge(metadata_routes)
        .merge(queue_routes)
        .merge(config_routes);

    if state.config.rate_limit_rps > 0 {
        let rate_limiter = Arc::new(RateLimiterCache::new(
            state.config.rate_limit_rps,
            state.config.rate_limit_burst,
        ));
        api_routes = api_routes.layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));
    }

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    // Layers run outermost-last: request_id wraps request_logging so the
    // logged line carries the id.
    Router::new()
        .nest("/api", api_routes)
        // Nesting maps the inner "/" to the bare prefix only.
        .route("/api/", get(root))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
