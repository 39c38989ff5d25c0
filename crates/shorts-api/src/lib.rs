//! Axum HTTP API server for the shorts upload scheduler.
//!
//! This crate provides:
//! - Upload, metadata, queue, dashboard and configuration endpoints
//! - Per-IP rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
