//! Scheduling policy.
//!
//! Pure functions that turn a symbolic interval into a publish time and
//! pair ordered videos with ordered unused metadata. Nothing here touches
//! the store.

use chrono::{DateTime, Duration, Utc};
use shorts_models::{
    Metadata, MetadataId, ScheduleInterval, SequentialScheduleRequest, Video, VideoId,
};

use crate::error::{SchedulerError, SchedulerResult};

/// Gap between consecutive `immediately` items in a batch.
pub const IMMEDIATE_STAGGER_MINUTES: i64 = 2;

/// Offset from "now" for a known interval.
pub fn interval_offset(interval: ScheduleInterval) -> Duration {
    Duration::minutes(interval.minutes())
}

/// Offset for a raw interval symbol. Unknown symbols resolve to zero.
pub fn resolve_offset(symbol: &str) -> Duration {
    ScheduleInterval::from_symbol(symbol)
        .map(interval_offset)
        .unwrap_or_else(Duration::zero)
}

/// Publish time for a single admission.
pub fn scheduled_time(interval: ScheduleInterval, now: DateTime<Utc>) -> DateTime<Utc> {
    now + interval_offset(interval)
}

/// Offset of the item at absolute list position `index` within a batch.
///
/// The position is the index in the full ordered lists, not the position
/// inside the requested slice, so a late start sequence yields later times.
pub fn batch_offset(interval: ScheduleInterval, index: usize) -> Duration {
    let index = index as i64;
    if interval.is_immediate() {
        Duration::minutes(index * IMMEDIATE_STAGGER_MINUTES)
    } else {
        let minutes = interval.minutes();
        Duration::minutes(minutes + index * minutes)
    }
}

/// One video/metadata pairing produced by [`plan_sequential`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    /// Absolute position in both ordered lists
    pub index: usize,
    pub video_id: VideoId,
    pub metadata_id: MetadataId,
    pub scheduled_time: DateTime<Utc>,
}

/// Pair `videos[i]` with `metadata[i]` for the requested slice.
///
/// Both slices must already be ordered by sequence number and `metadata`
/// must contain only unused records.
pub fn plan_sequential(
    videos: &[Video],
    metadata: &[Metadata],
    request: &SequentialScheduleRequest,
    now: DateTime<Utc>,
) -> SchedulerResult<Vec<PlannedEntry>> {
    if videos.is_empty() {
        return Err(SchedulerError::empty_resource("No videos available"));
    }
    if metadata.is_empty() {
        return Err(SchedulerError::empty_resource("No unused metadata available"));
    }

    let start_idx = request.start_sequence.saturating_sub(1).max(0) as usize;
    let available = videos.len().min(metadata.len());
    let count = request
        .count
        .filter(|c| *c > 0)
        .map(|c| c as usize)
        .unwrap_or(available);
    let end_idx = start_idx.saturating_add(count).min(available);

    if start_idx >= videos.len() || start_idx >= metadata.len() {
        return Err(SchedulerError::invalid_input(
            "Start sequence exceeds available items",
        ));
    }

    let planned = (start_idx..end_idx)
        .map(|i| PlannedEntry {
            index: i,
            video_id: videos[i].id.clone(),
            metadata_id: metadata[i].id.clone(),
            scheduled_time: now + batch_offset(request.schedule_interval, i),
        })
        .collect();

    Ok(planned)
}
