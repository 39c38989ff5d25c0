//! Uploaded video models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{MetadataId, VideoId};

/// Lifecycle status shared by videos and queue entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// File stored, not yet queued
    Uploaded,
    /// Waiting for its scheduled publish time
    #[default]
    Pending,
    /// Published
    Completed,
    /// Publishing failed
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Pending => "pending",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(UploadStatus::Uploaded),
            "pending" => Ok(UploadStatus::Pending),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("Unknown status: {}", other)),
        }
    }
}

/// A video file accepted by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    /// Unique video ID
    pub id: VideoId,

    /// Original client-side filename
    pub filename: String,

    /// Where the file was written
    pub file_path: String,

    /// Size in bytes
    pub file_size: u64,

    /// Upload timestamp
    pub upload_date: DateTime<Utc>,

    #[serde(default = "default_video_status")]
    pub status: UploadStatus,

    /// Metadata assigned to this video, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_id: Option<MetadataId>,

    /// Monotonic upload order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
}

fn default_video_status() -> UploadStatus {
    UploadStatus::Uploaded
}

impl Video {
    /// Create a freshly uploaded video record.
    pub fn new(
        id: VideoId,
        filename: impl Into<String>,
        file_path: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            id,
            filename: filename.into(),
            file_path: file_path.into(),
            file_size,
            upload_date: Utc::now(),
            status: UploadStatus::Uploaded,
            metadata_id: None,
            sequence_number: None,
        }
    }

    /// Attach the sequence number allocated for this upload.
    pub fn with_sequence(mut self, sequence_number: i64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            UploadStatus::Uploaded,
            UploadStatus::Pending,
            UploadStatus::Completed,
            UploadStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<UploadStatus>().unwrap(), status);
        }
        assert!("done".parse::<UploadStatus>().is_err());
    }

    #[test]
    fn test_new_video_defaults() {
        let video = Video::new(VideoId::new(), "clip.mp4", "uploads/x_clip.mp4", 42).with_sequence(3);
        assert_eq!(video.status, UploadStatus::Uploaded);
        assert_eq!(video.sequence_number, Some(3));
        assert!(video.metadata_id.is_none());
    }

    #[test]
    fn test_video_json_shape() {
        let video = Video::new(VideoId::from_string("v1"), "a.mov", "uploads/v1_a.mov", 10);
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["id"], "v1");
        assert_eq!(json["status"], "uploaded");
        assert!(json.get("metadata_id").is_none());
    }
}
