//! Queue entries, schedule intervals and batch scheduling DTOs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ids::{MetadataId, QueueEntryId, VideoId};
use crate::video::UploadStatus;

/// Symbolic delay between "now" and a publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum ScheduleInterval {
    #[default]
    #[serde(rename = "immediately")]
    Immediately,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "3h")]
    ThreeHours,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown schedule interval: {0}")]
pub struct ParseIntervalError(pub String);

impl ScheduleInterval {
    pub const ALL: [ScheduleInterval; 4] = [
        ScheduleInterval::Immediately,
        ScheduleInterval::ThirtyMinutes,
        ScheduleInterval::OneHour,
        ScheduleInterval::ThreeHours,
    ];

    /// Wire symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleInterval::Immediately => "immediately",
            ScheduleInterval::ThirtyMinutes => "30m",
            ScheduleInterval::OneHour => "1h",
            ScheduleInterval::ThreeHours => "3h",
        }
    }

    /// Look up a wire symbol. Returns `None` for anything unrecognized.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == symbol)
    }

    /// Offset from "now" in minutes.
    pub fn minutes(&self) -> i64 {
        match self {
            ScheduleInterval::Immediately => 0,
            ScheduleInterval::ThirtyMinutes => 30,
            ScheduleInterval::OneHour => 60,
            ScheduleInterval::ThreeHours => 180,
        }
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, ScheduleInterval::Immediately)
    }
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScheduleInterval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s).ok_or_else(|| ParseIntervalError(s.to_string()))
    }
}

/// A scheduled pairing of one video and one metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub video_id: VideoId,
    pub metadata_id: MetadataId,
    pub schedule_interval: ScheduleInterval,
    /// Target publish time
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub status: UploadStatus,
    pub created_date: DateTime<Utc>,
}

impl QueueEntry {
    /// Create a pending entry.
    pub fn pending(
        video_id: VideoId,
        metadata_id: MetadataId,
        schedule_interval: ScheduleInterval,
        scheduled_time: DateTime<Utc>,
        created_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QueueEntryId::new(),
            video_id,
            metadata_id,
            schedule_interval,
            scheduled_time,
            status: UploadStatus::Pending,
            created_date,
        }
    }
}

/// Request body for single-item queue admission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueEntryCreate {
    pub video_id: VideoId,
    pub metadata_id: MetadataId,
    pub schedule_interval: ScheduleInterval,
}

/// Request body for changing a queue entry's status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueStatusUpdate {
    pub status: UploadStatus,
}

/// Request body for sequential batch scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SequentialScheduleRequest {
    #[serde(default)]
    pub schedule_interval: ScheduleInterval,

    /// 1-based position in the ordered lists where the batch starts
    #[serde(default = "default_start_sequence")]
    pub start_sequence: i64,

    /// Number of pairs to schedule; absent or 0 means all available
    #[serde(default)]
    pub count: Option<u32>,
}

fn default_start_sequence() -> i64 {
    1
}

impl Default for SequentialScheduleRequest {
    fn default() -> Self {
        Self {
            schedule_interval: ScheduleInterval::Immediately,
            start_sequence: 1,
            count: None,
        }
    }
}

/// Result of a sequential batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SequentialScheduleResponse {
    pub message: String,
    pub scheduled_count: usize,
    pub start_sequence: i64,
    pub schedule_interval: ScheduleInterval,
}

impl SequentialScheduleResponse {
    pub fn new(scheduled_count: usize, request: &SequentialScheduleRequest) -> Self {
        Self {
            message: format!("Scheduled {} videos for upload", scheduled_count),
            scheduled_count,
            start_sequence: request.start_sequence,
            schedule_interval: request.schedule_interval,
        }
    }
}
