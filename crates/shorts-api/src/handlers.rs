//! Request handlers.

pub mod configs;
pub mod dashboard;
pub mod health;
pub mod metadata;
pub mod queue;
pub mod videos;

pub use configs::*;
pub use dashboard::*;
pub use health::*;
pub use metadata::*;
pub use queue::*;
pub use videos::*;

use serde::Serialize;

/// Plain `{"message": ...}` body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
