//! Queue service: request validation and orchestration over a [`QueueStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shorts_models::{
    ApiConfiguration, ApiConfigurationInput, ConfigId, DashboardStats, Metadata,
    MetadataBulkCreate, MetadataCreate, MetadataId, QueueEntry, QueueEntryCreate, QueueEntryId,
    SequentialScheduleRequest, SequentialScheduleResponse, UploadStatus, Video, VideoId,
};
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::schedule::{plan_sequential, scheduled_time};
use crate::store::{MetadataClaim, MetadataFilter, QueueStore, SequenceKind};

/// Entry point for every queue operation exposed by the API.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn QueueStore>,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    // ========================================================================
    // Videos
    // ========================================================================

    /// Record an uploaded file and give it the next video sequence number.
    pub async fn register_video(
        &self,
        id: VideoId,
        filename: &str,
        file_path: &str,
        file_size: u64,
    ) -> SchedulerResult<Video> {
        let sequence = self.store.next_sequence(SequenceKind::Video).await?;
        let video = Video::new(id, filename, file_path, file_size).with_sequence(sequence);
        self.store.insert_video(&video).await?;

        info!(
            video_id = %video.id,
            sequence_number = sequence,
            file_size,
            "Registered uploaded video"
        );
        Ok(video)
    }

    pub async fn list_videos(&self) -> SchedulerResult<Vec<Video>> {
        Ok(self.store.list_videos().await?)
    }

    pub async fn get_video(&self, id: &VideoId) -> SchedulerResult<Video> {
        self.store
            .get_video(id)
            .await?
            .ok_or_else(|| SchedulerError::not_found("Video not found"))
    }

    /// Remove a video record and return it so the caller can drop the file.
    pub async fn delete_video(&self, id: &VideoId) -> SchedulerResult<Video> {
        let video = self.get_video(id).await?;
        if !self.store.delete_video(id).await? {
            return Err(SchedulerError::not_found("Video not found"));
        }
        info!(video_id = %id, "Deleted video");
        Ok(video)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub async fn create_metadata(&self, input: MetadataCreate) -> SchedulerResult<Metadata> {
        input.validate().map_err(SchedulerError::InvalidInput)?;

        let sequence = self.store.next_sequence(SequenceKind::Metadata).await?;
        let record = Metadata::from_create(input, sequence);
        self.store
            .insert_metadata(std::slice::from_ref(&record))
            .await?;

        debug!(metadata_id = %record.id, sequence_number = sequence, "Created metadata");
        Ok(record)
    }

    /// Create many records; sequence numbers follow the input order.
    pub async fn create_metadata_bulk(
        &self,
        input: MetadataBulkCreate,
    ) -> SchedulerResult<Vec<Metadata>> {
        input.validate().map_err(SchedulerError::InvalidInput)?;

        let mut records = Vec::with_capacity(input.0.len());
        for entry in input.0 {
            let sequence = self.store.next_sequence(SequenceKind::Metadata).await?;
            records.push(Metadata::from_create(entry, sequence));
        }
        self.store.insert_metadata(&records).await?;

        info!(count = records.len(), "Created metadata in bulk");
        Ok(records)
    }

    pub async fn list_metadata(&self) -> SchedulerResult<Vec<Metadata>> {
        Ok(self.store.list_metadata(MetadataFilter::All).await?)
    }

    pub async fn list_unused_metadata(&self) -> SchedulerResult<Vec<Metadata>> {
        Ok(self.store.list_metadata(MetadataFilter::Unused).await?)
    }

    pub async fn delete_metadata(&self, id: &MetadataId) -> SchedulerResult<()> {
        if !self.store.delete_metadata(id).await? {
            return Err(SchedulerError::not_found("Metadata not found"));
        }
        Ok(())
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// Queue one video with one metadata record.
    pub async fn admit(&self, request: QueueEntryCreate) -> SchedulerResult<QueueEntry> {
        self.admit_at(request, Utc::now()).await
    }

    pub async fn admit_at(
        &self,
        request: QueueEntryCreate,
        now: DateTime<Utc>,
    ) -> SchedulerResult<QueueEntry> {
        if self.store.get_video(&request.video_id).await?.is_none() {
            return Err(SchedulerError::not_found("Video not found"));
        }
        if self.store.get_metadata(&request.metadata_id).await?.is_none() {
            return Err(SchedulerError::not_found("Metadata not found"));
        }

        let entry = QueueEntry::pending(
            request.video_id,
            request.metadata_id,
            request.schedule_interval,
            scheduled_time(request.schedule_interval, now),
            now,
        );
        self.store.enqueue(&entry, MetadataClaim::Any).await?;

        info!(
            queue_id = %entry.id,
            video_id = %entry.video_id,
            metadata_id = %entry.metadata_id,
            interval = %entry.schedule_interval,
            scheduled_time = %entry.scheduled_time,
            "Queued video"
        );
        Ok(entry)
    }

    /// Pair ordered videos with ordered unused metadata and queue the slice.
    pub async fn schedule_sequential(
        &self,
        request: SequentialScheduleRequest,
    ) -> SchedulerResult<SequentialScheduleResponse> {
        self.schedule_sequential_at(request, Utc::now()).await
    }

    /// Pairs are committed one at a time. A failure stops the batch and
    /// leaves the pairs committed so far in place.
    pub async fn schedule_sequential_at(
        &self,
        request: SequentialScheduleRequest,
        now: DateTime<Utc>,
    ) -> SchedulerResult<SequentialScheduleResponse> {
        let (videos, metadata) = tokio::try_join!(
            self.store.list_videos(),
            self.store.list_metadata(MetadataFilter::Unused),
        )?;

        let plan = plan_sequential(&videos, &metadata, &request, now)?;

        let mut scheduled = 0usize;
        for planned in plan {
            let entry = QueueEntry::pending(
                planned.video_id,
                planned.metadata_id,
                request.schedule_interval,
                planned.scheduled_time,
                now,
            );
            if let Err(e) = self.store.enqueue(&entry, MetadataClaim::RequireUnused).await {
                warn!(
                    index = planned.index,
                    scheduled,
                    error = %e,
                    "Sequential scheduling stopped partway"
                );
                return Err(SchedulerError::from(e));
            }
            scheduled += 1;
        }

        info!(
            scheduled,
            start_sequence = request.start_sequence,
            interval = %request.schedule_interval,
            "Sequential scheduling complete"
        );
        Ok(SequentialScheduleResponse::new(scheduled, &request))
    }

    pub async fn list_queue(&self) -> SchedulerResult<Vec<QueueEntry>> {
        Ok(self.store.list_queue(None).await?)
    }

    pub async fn list_pending(&self) -> SchedulerResult<Vec<QueueEntry>> {
        Ok(self.store.list_queue(Some(UploadStatus::Pending)).await?)
    }

    pub async fn update_queue_status(
        &self,
        id: &QueueEntryId,
        status: UploadStatus,
    ) -> SchedulerResult<QueueEntry> {
        let entry = self
            .store
            .update_queue_status(id, status)
            .await?
            .ok_or_else(|| SchedulerError::not_found("Queue entry not found"))?;
        info!(queue_id = %id, status = %status, "Queue entry status changed");
        Ok(entry)
    }

    /// Remove an entry. Its metadata stays marked as used.
    pub async fn delete_queue_entry(&self, id: &QueueEntryId) -> SchedulerResult<()> {
        if !self.store.delete_queue_entry(id).await? {
            return Err(SchedulerError::not_found("Queue entry not found"));
        }
        Ok(())
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    pub async fn dashboard_stats(&self) -> SchedulerResult<DashboardStats> {
        let (total_videos, completed, pending, unused_metadata) = tokio::try_join!(
            self.store.count_videos(),
            self.store.count_queue(UploadStatus::Completed),
            self.store.count_queue(UploadStatus::Pending),
            self.store.count_unused_metadata(),
        )?;

        Ok(DashboardStats {
            total_videos,
            completed,
            pending,
            unused_metadata,
        })
    }

    // ========================================================================
    // API configurations
    // ========================================================================

    pub async fn list_configurations(&self) -> SchedulerResult<Vec<ApiConfiguration>> {
        Ok(self.store.list_configurations().await?)
    }

    pub async fn active_configuration(&self) -> SchedulerResult<ApiConfiguration> {
        self.store
            .list_configurations()
            .await?
            .into_iter()
            .find(|c| c.is_active)
            .ok_or_else(|| SchedulerError::not_found("No active configuration"))
    }

    /// Store a new configuration and make it the only active one.
    pub async fn create_configuration(
        &self,
        input: ApiConfigurationInput,
    ) -> SchedulerResult<ApiConfiguration> {
        input.validate().map_err(SchedulerError::InvalidInput)?;
        let config = ApiConfiguration::from_input(input, Utc::now());
        let active = self.store.activate_configuration(&config).await?;
        info!(config_id = %active.id, "Created and activated configuration");
        Ok(active)
    }

    /// Replace a configuration and make it the only active one.
    pub async fn update_configuration(
        &self,
        id: &ConfigId,
        input: ApiConfigurationInput,
    ) -> SchedulerResult<ApiConfiguration> {
        input.validate().map_err(SchedulerError::InvalidInput)?;
        let mut config = self
            .store
            .get_configuration(id)
            .await?
            .ok_or_else(|| SchedulerError::not_found("Configuration not found"))?;
        config.apply(input, Utc::now());
        let active = self.store.activate_configuration(&config).await?;
        info!(config_id = %active.id, "Updated and activated configuration");
        Ok(active)
    }

    /// Delete a configuration, active or not. May leave none active.
    pub async fn delete_configuration(&self, id: &ConfigId) -> SchedulerResult<()> {
        if !self.store.delete_configuration(id).await? {
            return Err(SchedulerError::not_found("Configuration not found"));
        }
        info!(config_id = %id, "Deleted configuration");
        Ok(())
    }
}
