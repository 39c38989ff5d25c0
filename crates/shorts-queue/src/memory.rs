//! In-memory [`QueueStore`] used for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use shorts_models::{
    ApiConfiguration, ConfigId, Metadata, MetadataId, QueueEntry, QueueEntryId, UploadStatus,
    Video, VideoId,
};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::{order_by_sequence, MetadataClaim, MetadataFilter, QueueStore, SequenceKind};

#[derive(Default)]
struct Inner {
    videos: HashMap<VideoId, Video>,
    metadata: HashMap<MetadataId, Metadata>,
    queue: HashMap<QueueEntryId, QueueEntry>,
    configs: HashMap<ConfigId, ApiConfiguration>,
    sequences: HashMap<SequenceKind, i64>,
}

/// Store keeping every collection in one lock so multi-record writes are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn next_sequence(&self, kind: SequenceKind) -> StoreResult<i64> {
        let mut inner = self.inner.write().await;
        let counter = inner.sequences.entry(kind).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_video(&self, video: &Video) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.videos.insert(video.id.clone(), video.clone());
        Ok(())
    }

    async fn get_video(&self, id: &VideoId) -> StoreResult<Option<Video>> {
        Ok(self.inner.read().await.videos.get(id).cloned())
    }

    async fn list_videos(&self) -> StoreResult<Vec<Video>> {
        let mut videos: Vec<Video> = self.inner.read().await.videos.values().cloned().collect();
        order_by_sequence(&mut videos);
        Ok(videos)
    }

    async fn delete_video(&self, id: &VideoId) -> StoreResult<bool> {
        Ok(self.inner.write().await.videos.remove(id).is_some())
    }

    async fn count_videos(&self) -> StoreResult<u64> {
        Ok(self.inner.read().await.videos.len() as u64)
    }

    async fn insert_metadata(&self, records: &[Metadata]) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        for record in records {
            inner.metadata.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn get_metadata(&self, id: &MetadataId) -> StoreResult<Option<Metadata>> {
        Ok(self.inner.read().await.metadata.get(id).cloned())
    }

    async fn list_metadata(&self, filter: MetadataFilter) -> StoreResult<Vec<Metadata>> {
        let mut records: Vec<Metadata> = self
            .inner
            .read()
            .await
            .metadata
            .values()
            .filter(|m| filter == MetadataFilter::All || !m.is_used)
            .cloned()
            .collect();
        order_by_sequence(&mut records);
        Ok(records)
    }

    async fn delete_metadata(&self, id: &MetadataId) -> StoreResult<bool> {
        Ok(self.inner.write().await.metadata.remove(id).is_some())
    }

    async fn count_unused_metadata(&self) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.metadata.values().filter(|m| !m.is_used).count() as u64)
    }

    async fn enqueue(&self, entry: &QueueEntry, claim: MetadataClaim) -> StoreResult<()> {
        let mut inner = self.inner.write().await;

        if !inner.videos.contains_key(&entry.video_id) {
            return Err(StoreError::not_found("Video not found"));
        }
        let metadata = inner
            .metadata
            .get_mut(&entry.metadata_id)
            .ok_or_else(|| StoreError::not_found("Metadata not found"))?;
        if claim == MetadataClaim::RequireUnused && metadata.is_used {
            return Err(StoreError::conflict(format!(
                "Metadata {} is already used",
                entry.metadata_id
            )));
        }

        metadata.is_used = true;
        if let Some(video) = inner.videos.get_mut(&entry.video_id) {
            video.metadata_id = Some(entry.metadata_id.clone());
        }
        inner.queue.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn get_queue_entry(&self, id: &QueueEntryId) -> StoreResult<Option<QueueEntry>> {
        Ok(self.inner.read().await.queue.get(id).cloned())
    }

    async fn list_queue(&self, status: Option<UploadStatus>) -> StoreResult<Vec<QueueEntry>> {
        let mut entries: Vec<QueueEntry> = self
            .inner
            .read()
            .await
            .queue
            .values()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then_with(|| a.created_date.cmp(&b.created_date))
        });
        Ok(entries)
    }

    async fn update_queue_status(
        &self,
        id: &QueueEntryId,
        status: UploadStatus,
    ) -> StoreResult<Option<QueueEntry>> {
        let mut inner = self.inner.write().await;
        Ok(inner.queue.get_mut(id).map(|entry| {
            entry.status = status;
            entry.clone()
        }))
    }

    async fn delete_queue_entry(&self, id: &QueueEntryId) -> StoreResult<bool> {
        Ok(self.inner.write().await.queue.remove(id).is_some())
    }

    async fn count_queue(&self, status: UploadStatus) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.queue.values().filter(|e| e.status == status).count() as u64)
    }

    async fn list_configurations(&self) -> StoreResult<Vec<ApiConfiguration>> {
        let mut configs: Vec<ApiConfiguration> =
            self.inner.read().await.configs.values().cloned().collect();
        configs.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(configs)
    }

    async fn get_configuration(&self, id: &ConfigId) -> StoreResult<Option<ApiConfiguration>> {
        Ok(self.inner.read().await.configs.get(id).cloned())
    }

    async fn activate_configuration(
        &self,
        config: &ApiConfiguration,
    ) -> StoreResult<ApiConfiguration> {
        let mut inner = self.inner.write().await;
        for other in inner.configs.values_mut() {
            other.is_active = false;
        }
        let mut active = config.clone();
        active.is_active = true;
        inner.configs.insert(active.id.clone(), active.clone());
        Ok(active)
    }

    async fn delete_configuration(&self, id: &ConfigId) -> StoreResult<bool> {
        Ok(self.inner.write().await.configs.remove(id).is_some())
    }
}
