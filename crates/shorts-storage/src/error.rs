//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while storing uploads.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No file selected")]
    EmptyFilename,

    /// Message lists the accepted extensions.
    #[error("{0}")]
    InvalidExtension(String),

    /// Message names the ceiling.
    #[error("{0}")]
    TooLarge(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Whether the error was caused by the client's file rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StorageError::EmptyFilename
                | StorageError::InvalidExtension(_)
                | StorageError::TooLarge(_)
                | StorageError::UploadFailed(_)
        )
    }
}
