//! API error types.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use shorts_queue::{SchedulerError, StoreError};
use shorts_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by handlers. The message becomes the `detail` field.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Malformed or mistyped JSON bodies are client errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json` extractor whose rejections render as `{"detail": ...}` with 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NotFound(msg) => ApiError::NotFound(msg),
            SchedulerError::InvalidInput(msg) | SchedulerError::EmptyResource(msg) => {
                ApiError::BadRequest(msg)
            }
            SchedulerError::Conflict(msg) => ApiError::Conflict(msg),
            SchedulerError::Store(e) => ApiError::Store(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
            if std::env::var("ENVIRONMENT")
                .map(|e| e.eq_ignore_ascii_case("production"))
                .unwrap_or(false)
            {
                "An internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_mapping() {
        let cases = [
            (SchedulerError::not_found("Video not found"), StatusCode::NOT_FOUND),
            (
                SchedulerError::invalid_input("Start sequence exceeds available items"),
                StatusCode::BAD_REQUEST,
            ),
            (
                SchedulerError::empty_resource("No videos available"),
                StatusCode::BAD_REQUEST,
            ),
            (
                SchedulerError::Conflict("Metadata m is already used".into()),
                StatusCode::CONFLICT,
            ),
            (
                SchedulerError::Store(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_storage_client_errors_are_bad_requests() {
        assert_eq!(
            ApiError::from(StorageError::EmptyFilename).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::TooLarge("File size exceeds 2GB limit".into()))
                .status_code(),
            StatusCode::BAD_REQUEST
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(
            ApiError::from(StorageError::Io(io)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_json_rejection_is_bad_request() {
        use axum::body::Body;
        use axum::http::{header, Request};

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct TitleOnly {
            title: String,
        }

        let request = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"other": 1}"#))
            .unwrap();
        let err = ApiJson::<TitleOnly>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_detail_is_the_bare_message() {
        assert_eq!(
            ApiError::from(SchedulerError::not_found("Metadata not found")).to_string(),
            "Metadata not found"
        );
        assert_eq!(
            ApiError::from(StorageError::EmptyFilename).to_string(),
            "No file selected"
        );
    }
}
