//! Persistence abstraction for the upload queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shorts_models::{
    ApiConfiguration, ConfigId, Metadata, MetadataId, QueueEntry, QueueEntryId, UploadStatus,
    Video, VideoId,
};

use crate::error::StoreResult;

/// Which append-only sequence a number is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    Video,
    Metadata,
}

impl SequenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::Video => "videos",
            SequenceKind::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFilter {
    All,
    Unused,
}

/// Requirement on the metadata record when a queue entry is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataClaim {
    /// Mark used whatever its current state.
    Any,
    /// Fail with a conflict if another entry already claimed it.
    RequireUnused,
}

/// Storage operations consumed by the queue service.
///
/// Implementations must make [`QueueStore::next_sequence`],
/// [`QueueStore::enqueue`] and [`QueueStore::activate_configuration`] atomic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Cheap connectivity check used by readiness probes.
    async fn ping(&self) -> StoreResult<()>;

    /// Allocate the next number of an append-only sequence, starting at 1.
    async fn next_sequence(&self, kind: SequenceKind) -> StoreResult<i64>;

    async fn insert_video(&self, video: &Video) -> StoreResult<()>;
    async fn get_video(&self, id: &VideoId) -> StoreResult<Option<Video>>;
    /// All videos ordered by sequence number.
    async fn list_videos(&self) -> StoreResult<Vec<Video>>;
    async fn delete_video(&self, id: &VideoId) -> StoreResult<bool>;
    async fn count_videos(&self) -> StoreResult<u64>;

    async fn insert_metadata(&self, records: &[Metadata]) -> StoreResult<()>;
    async fn get_metadata(&self, id: &MetadataId) -> StoreResult<Option<Metadata>>;
    /// Metadata ordered by sequence number.
    async fn list_metadata(&self, filter: MetadataFilter) -> StoreResult<Vec<Metadata>>;
    async fn delete_metadata(&self, id: &MetadataId) -> StoreResult<bool>;
    async fn count_unused_metadata(&self) -> StoreResult<u64>;

    /// Insert the entry, mark its metadata used and record the metadata id
    /// on the video, all or nothing.
    async fn enqueue(&self, entry: &QueueEntry, claim: MetadataClaim) -> StoreResult<()>;
    async fn get_queue_entry(&self, id: &QueueEntryId) -> StoreResult<Option<QueueEntry>>;
    /// Queue entries ordered by scheduled time ascending.
    async fn list_queue(&self, status: Option<UploadStatus>) -> StoreResult<Vec<QueueEntry>>;
    async fn update_queue_status(
        &self,
        id: &QueueEntryId,
        status: UploadStatus,
    ) -> StoreResult<Option<QueueEntry>>;
    async fn delete_queue_entry(&self, id: &QueueEntryId) -> StoreResult<bool>;
    async fn count_queue(&self, status: UploadStatus) -> StoreResult<u64>;

    async fn list_configurations(&self) -> StoreResult<Vec<ApiConfiguration>>;
    async fn get_configuration(&self, id: &ConfigId) -> StoreResult<Option<ApiConfiguration>>;
    /// Upsert `config` as the only active configuration.
    async fn activate_configuration(
        &self,
        config: &ApiConfiguration,
    ) -> StoreResult<ApiConfiguration>;
    async fn delete_configuration(&self, id: &ConfigId) -> StoreResult<bool>;
}

/// Records carrying an append-only sequence number.
pub trait Sequenced {
    fn sequence_number(&self) -> Option<i64>;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Sequenced for Video {
    fn sequence_number(&self) -> Option<i64> {
        self.sequence_number
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.upload_date
    }
}

impl Sequenced for Metadata {
    fn sequence_number(&self) -> Option<i64> {
        self.sequence_number
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_date
    }
}

/// Sort by sequence number ascending; unnumbered records go last, oldest first.
pub fn order_by_sequence<T: Sequenced>(items: &mut [T]) {
    items.sort_by(|a, b| {
        let key = |x: &T| (x.sequence_number().is_none(), x.sequence_number(), x.created_at());
        key(a).cmp(&key(b))
    });
}
