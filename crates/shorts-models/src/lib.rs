//! Shared data models for the shorts scheduler.
//!
//! This crate provides Serde-serializable types for:
//! - Uploaded videos and their lifecycle status
//! - Title/description/hashtag metadata records
//! - Queue entries and schedule intervals
//! - Publishing API configurations
//! - Dashboard statistics

pub mod config;
pub mod ids;
pub mod metadata;
pub mod queue;
pub mod stats;
pub mod video;

// Re-export common types
pub use config::{ApiConfiguration, ApiConfigurationInput, ApiConfigurationView, PrivacyStatus};
pub use ids::{ConfigId, MetadataId, QueueEntryId, VideoId};
pub use metadata::{Metadata, MetadataBulkCreate, MetadataCreate};
pub use queue::{
    ParseIntervalError, QueueEntry, QueueEntryCreate, QueueStatusUpdate, ScheduleInterval,
    SequentialScheduleRequest, SequentialScheduleResponse,
};
pub use stats::DashboardStats;
pub use video::{UploadStatus, Video};
