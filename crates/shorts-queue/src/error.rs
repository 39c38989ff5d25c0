//! Queue error types.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`crate::QueueStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A precondition did not hold (record changed or already claimed).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors surfaced to callers of [`crate::QueueService`].
///
/// None of these are retried by the service.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Referenced video, metadata, queue entry or configuration is absent.
    #[error("{0}")]
    NotFound(String),

    /// Malformed request or start sequence out of bounds.
    #[error("{0}")]
    InvalidInput(String),

    /// No videos or no unused metadata to schedule.
    #[error("{0}")]
    EmptyResource(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl SchedulerError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn empty_resource(msg: impl Into<String>) -> Self {
        Self::EmptyResource(msg.into())
    }
}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => SchedulerError::NotFound(msg),
            StoreError::Conflict(msg) => SchedulerError::Conflict(msg),
            other => SchedulerError::Store(other),
        }
    }
}
