//! [`QueueStore`] backed by Firestore.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use shorts_models::{
    ApiConfiguration, ConfigId, Metadata, MetadataId, QueueEntry, QueueEntryId, UploadStatus,
    Video, VideoId,
};
use shorts_queue::{
    order_by_sequence, MetadataClaim, MetadataFilter, QueueStore, SequenceKind, StoreError,
    StoreResult,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_precondition_conflict;
use crate::repos::{
    collections, configuration_to_fields, queue_entry_to_fields, single_field, ConfigRepository,
    MetadataRepository, QueueRepository, SequenceCounter, VideoRepository,
};
use crate::types::{Document, Precondition, ToFirestoreValue, Write};

/// Maximum attempts for a commit that lost an optimistic-concurrency race.
const MAX_COMMIT_RETRIES: u32 = 5;

impl From<FirestoreError> for StoreError {
    fn from(err: FirestoreError) -> Self {
        match err {
            FirestoreError::NotFound(msg) => StoreError::NotFound(msg),
            FirestoreError::AlreadyExists(msg) | FirestoreError::PreconditionFailed(msg) => {
                StoreError::Conflict(msg)
            }
            e @ (FirestoreError::Network(_)
            | FirestoreError::RateLimited(_)
            | FirestoreError::ServerError(_, _)) => StoreError::Unavailable(e.to_string()),
            e => StoreError::Backend(e.to_string()),
        }
    }
}

/// Firestore-backed queue persistence.
#[derive(Clone)]
pub struct FirestoreQueueStore {
    client: FirestoreClient,
    videos: VideoRepository,
    metadata: MetadataRepository,
    queue: QueueRepository,
    configs: ConfigRepository,
    counters: SequenceCounter,
}

impl FirestoreQueueStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            videos: VideoRepository::new(client.clone()),
            metadata: MetadataRepository::new(client.clone()),
            queue: QueueRepository::new(client.clone()),
            configs: ConfigRepository::new(client.clone()),
            counters: SequenceCounter::new(client.clone()),
            client,
        }
    }

    /// Connect using `GCP_PROJECT_ID` and friends.
    pub async fn from_env() -> FirestoreResult<Self> {
        Ok(Self::new(FirestoreClient::from_env().await?))
    }

    fn document(&self, collection: &str, id: &str, fields: crate::types::Fields) -> Document {
        Document::named(self.client.full_document_name(collection, id), fields)
    }

    /// Writes for one enqueue: create the entry, claim the metadata, link the video.
    fn enqueue_writes(&self, entry: &QueueEntry, metadata_precondition: Precondition) -> Vec<Write> {
        vec![
            Write::create(self.document(
                collections::UPLOAD_QUEUE,
                entry.id.as_str(),
                queue_entry_to_fields(entry),
            )),
            Write::patch(
                self.document(
                    collections::METADATA,
                    entry.metadata_id.as_str(),
                    single_field("is_used", true.to_firestore_value()),
                ),
                &["is_used"],
            )
            .with_precondition(metadata_precondition),
            Write::patch(
                self.document(
                    collections::VIDEOS,
                    entry.video_id.as_str(),
                    single_field("metadata_id", entry.metadata_id.as_str().to_firestore_value()),
                ),
                &["metadata_id"],
            )
            .with_precondition(Precondition::exists(true)),
        ]
    }
}

async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
}

#[async_trait]
impl QueueStore for FirestoreQueueStore {
    async fn ping(&self) -> StoreResult<()> {
        self.client
            .list_documents(collections::VIDEOS, Some(1), None)
            .await?;
        Ok(())
    }

    async fn next_sequence(&self, kind: SequenceKind) -> StoreResult<i64> {
        Ok(self.counters.next(kind.as_str()).await?)
    }

    async fn insert_video(&self, video: &Video) -> StoreResult<()> {
        Ok(self.videos.create(video).await?)
    }

    async fn get_video(&self, id: &VideoId) -> StoreResult<Option<Video>> {
        Ok(self.videos.get(id).await?)
    }

    async fn list_videos(&self) -> StoreResult<Vec<Video>> {
        let mut videos = self.videos.list().await?;
        order_by_sequence(&mut videos);
        Ok(videos)
    }

    async fn delete_video(&self, id: &VideoId) -> StoreResult<bool> {
        Ok(self.videos.delete(id).await?)
    }

    async fn count_videos(&self) -> StoreResult<u64> {
        Ok(self.videos.count().await?)
    }

    async fn insert_metadata(&self, records: &[Metadata]) -> StoreResult<()> {
        Ok(self.metadata.create_many(records).await?)
    }

    async fn get_metadata(&self, id: &MetadataId) -> StoreResult<Option<Metadata>> {
        Ok(self.metadata.get(id).await?)
    }

    async fn list_metadata(&self, filter: MetadataFilter) -> StoreResult<Vec<Metadata>> {
        let mut records = self
            .metadata
            .list(filter == MetadataFilter::Unused)
            .await?;
        order_by_sequence(&mut records);
        Ok(records)
    }

    async fn delete_metadata(&self, id: &MetadataId) -> StoreResult<bool> {
        Ok(self.metadata.delete(id).await?)
    }

    async fn count_unused_metadata(&self) -> StoreResult<u64> {
        Ok(self.metadata.count_unused().await?)
    }

    async fn enqueue(&self, entry: &QueueEntry, claim: MetadataClaim) -> StoreResult<()> {
        for attempt in 0..MAX_COMMIT_RETRIES {
            if self.videos.get(&entry.video_id).await?.is_none() {
                return Err(StoreError::not_found("Video not found"));
            }
            let (metadata, update_time) = self
                .metadata
                .get_versioned(&entry.metadata_id)
                .await?
                .ok_or_else(|| StoreError::not_found("Metadata not found"))?;

            let precondition = match claim {
                MetadataClaim::RequireUnused => {
                    if metadata.is_used {
                        return Err(StoreError::conflict(format!(
                            "Metadata {} is already used",
                            entry.metadata_id
                        )));
                    }
                    update_time
                        .map(Precondition::updated_at)
                        .unwrap_or_else(|| Precondition::exists(true))
                }
                MetadataClaim::Any => Precondition::exists(true),
            };

            match self
                .client
                .commit(self.enqueue_writes(entry, precondition))
                .await
            {
                Ok(_) => {
                    debug!(entry_id = %entry.id, "Committed queue entry");
                    return Ok(());
                }
                // A referenced record changed or vanished between the read and
                // the commit; re-read to report the precise reason.
                Err(e) if e.is_precondition_failed() || matches!(e, FirestoreError::NotFound(_)) => {
                    record_precondition_conflict("enqueue");
                    debug!(entry_id = %entry.id, attempt = attempt + 1, "Enqueue raced: {}", e);
                    backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            "Enqueue of {} failed after {} retries",
            entry.id, MAX_COMMIT_RETRIES
        );
        Err(StoreError::conflict(format!(
            "Queue entry {} could not be committed",
            entry.id
        )))
    }

    async fn get_queue_entry(&self, id: &QueueEntryId) -> StoreResult<Option<QueueEntry>> {
        Ok(self.queue.get(id).await?)
    }

    async fn list_queue(&self, status: Option<UploadStatus>) -> StoreResult<Vec<QueueEntry>> {
        Ok(self.queue.list(status).await?)
    }

    async fn update_queue_status(
        &self,
        id: &QueueEntryId,
        status: UploadStatus,
    ) -> StoreResult<Option<QueueEntry>> {
        Ok(self.queue.update_status(id, status).await?)
    }

    async fn delete_queue_entry(&self, id: &QueueEntryId) -> StoreResult<bool> {
        Ok(self.queue.delete(id).await?)
    }

    async fn count_queue(&self, status: UploadStatus) -> StoreResult<u64> {
        Ok(self.queue.count(status).await?)
    }

    async fn list_configurations(&self) -> StoreResult<Vec<ApiConfiguration>> {
        Ok(self.configs.list().await?)
    }

    async fn get_configuration(&self, id: &ConfigId) -> StoreResult<Option<ApiConfiguration>> {
        Ok(self.configs.get(id).await?)
    }

    async fn activate_configuration(
        &self,
        config: &ApiConfiguration,
    ) -> StoreResult<ApiConfiguration> {
        let mut active = config.clone();
        active.is_active = true;

        for attempt in 0..MAX_COMMIT_RETRIES {
            let mut writes: Vec<Write> = self
                .configs
                .active_ids()
                .await?
                .into_iter()
                .filter(|id| *id != active.id)
                .map(|id| {
                    Write::patch(
                        self.document(
                            collections::API_CONFIGURATIONS,
                            id.as_str(),
                            single_field("is_active", false.to_firestore_value()),
                        ),
                        &["is_active"],
                    )
                    .with_precondition(Precondition::exists(true))
                })
                .collect();
            writes.push(Write::set(self.document(
                collections::API_CONFIGURATIONS,
                active.id.as_str(),
                configuration_to_fields(&active),
            )));

            match self.client.commit(writes).await {
                Ok(_) => return Ok(active),
                // A configuration was deleted concurrently.
                Err(e) if e.is_precondition_failed() || matches!(e, FirestoreError::NotFound(_)) => {
                    record_precondition_conflict("activate_configuration");
                    backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::conflict(format!(
            "Configuration {} could not be activated",
            active.id
        )))
    }

    async fn delete_configuration(&self, id: &ConfigId) -> StoreResult<bool> {
        Ok(self.configs.delete(id).await?)
    }
}
