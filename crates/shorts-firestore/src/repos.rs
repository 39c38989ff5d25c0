//! Typed repositories for videos, metadata, queue entries and configurations.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shorts_models::{
    ApiConfiguration, ConfigId, Metadata, MetadataId, PrivacyStatus, QueueEntry, QueueEntryId,
    ScheduleInterval, UploadStatus, Video, VideoId,
};

use crate::client::{FirestoreClient, MAX_COMMIT_WRITES};
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_precondition_conflict;
use crate::types::{
    Direction, Document, Fields, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value,
    Write,
};

/// Collection names.
pub mod collections {
    pub const VIDEOS: &str = "videos";
    pub const METADATA: &str = "metadata";
    pub const UPLOAD_QUEUE: &str = "upload_queue";
    pub const API_CONFIGURATIONS: &str = "api_configurations";
    pub const COUNTERS: &str = "counters";
}

/// Maximum attempts for a contended counter increment.
const MAX_COUNTER_RETRIES: u32 = 8;

// =============================================================================
// Videos
// =============================================================================

/// Repository for video documents.
#[derive(Clone)]
pub struct VideoRepository {
    client: FirestoreClient,
}

impl VideoRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get a video by ID.
    pub async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<Video>> {
        self.client
            .get_document(collections::VIDEOS, video_id.as_str())
            .await?
            .map(|d| document_to_video(&d))
            .transpose()
    }

    /// Create a new video record.
    pub async fn create(&self, video: &Video) -> FirestoreResult<()> {
        self.client
            .create_document(collections::VIDEOS, video.id.as_str(), video_to_fields(video))
            .await?;
        info!("Created video record: {}", video.id);
        Ok(())
    }

    /// All videos, unordered.
    pub async fn list(&self) -> FirestoreResult<Vec<Video>> {
        let docs = self.client.list_all_documents(collections::VIDEOS).await?;
        Ok(decode_all(&docs, document_to_video))
    }

    pub async fn delete(&self, video_id: &VideoId) -> FirestoreResult<bool> {
        self.client
            .delete_document(collections::VIDEOS, video_id.as_str())
            .await
    }

    pub async fn count(&self) -> FirestoreResult<u64> {
        self.client
            .run_count_query(StructuredQuery::collection(collections::VIDEOS))
            .await
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Repository for metadata documents.
#[derive(Clone)]
pub struct MetadataRepository {
    client: FirestoreClient,
}

impl MetadataRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &MetadataId) -> FirestoreResult<Option<Metadata>> {
        Ok(self.get_versioned(id).await?.map(|(m, _)| m))
    }

    /// Get a record together with its `updateTime` for conditional writes.
    pub async fn get_versioned(
        &self,
        id: &MetadataId,
    ) -> FirestoreResult<Option<(Metadata, Option<String>)>> {
        match self
            .client
            .get_document(collections::METADATA, id.as_str())
            .await?
        {
            Some(doc) => {
                let metadata = document_to_metadata(&doc)?;
                Ok(Some((metadata, doc.update_time)))
            }
            None => Ok(None),
        }
    }

    /// Insert records atomically in chunks of the commit limit.
    pub async fn create_many(&self, records: &[Metadata]) -> FirestoreResult<()> {
        for chunk in records.chunks(MAX_COMMIT_WRITES) {
            let writes = chunk
                .iter()
                .map(|m| {
                    Write::create(Document::named(
                        self.client
                            .full_document_name(collections::METADATA, m.id.as_str()),
                        metadata_to_fields(m),
                    ))
                })
                .collect();
            self.client.commit(writes).await?;
        }
        debug!(count = records.len(), "Created metadata records");
        Ok(())
    }

    /// List records, optionally only those not yet assigned to a queue entry.
    pub async fn list(&self, unused_only: bool) -> FirestoreResult<Vec<Metadata>> {
        let docs = if unused_only {
            self.client
                .run_query(
                    StructuredQuery::collection(collections::METADATA)
                        .where_eq("is_used", false.to_firestore_value()),
                )
                .await?
        } else {
            self.client.list_all_documents(collections::METADATA).await?
        };
        Ok(decode_all(&docs, document_to_metadata))
    }

    pub async fn delete(&self, id: &MetadataId) -> FirestoreResult<bool> {
        self.client
            .delete_document(collections::METADATA, id.as_str())
            .await
    }

    pub async fn count_unused(&self) -> FirestoreResult<u64> {
        self.client
            .run_count_query(
                StructuredQuery::collection(collections::METADATA)
                    .where_eq("is_used", false.to_firestore_value()),
            )
            .await
    }
}

// =============================================================================
// Upload queue
// =============================================================================

/// Repository for upload queue documents.
#[derive(Clone)]
pub struct QueueRepository {
    client: FirestoreClient,
}

impl QueueRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &QueueEntryId) -> FirestoreResult<Option<QueueEntry>> {
        self.client
            .get_document(collections::UPLOAD_QUEUE, id.as_str())
            .await?
            .map(|d| document_to_queue_entry(&d))
            .transpose()
    }

    /// Entries ordered by scheduled time, optionally filtered by status.
    pub async fn list(&self, status: Option<UploadStatus>) -> FirestoreResult<Vec<QueueEntry>> {
        let query = match status {
            // Equality plus ordering on another field needs a composite index;
            // filtered lists are sorted client-side instead.
            Some(s) => StructuredQuery::collection(collections::UPLOAD_QUEUE)
                .where_eq("status", s.as_str().to_firestore_value()),
            None => StructuredQuery::collection(collections::UPLOAD_QUEUE)
                .order_by("scheduled_time", Direction::Ascending),
        };
        let docs = self.client.run_query(query).await?;

        let mut entries = decode_all(&docs, document_to_queue_entry);
        entries.sort_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then_with(|| a.created_date.cmp(&b.created_date))
        });
        Ok(entries)
    }

    /// Set the status of an entry. Returns `None` if it does not exist.
    pub async fn update_status(
        &self,
        id: &QueueEntryId,
        status: UploadStatus,
    ) -> FirestoreResult<Option<QueueEntry>> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());

        match self
            .client
            .update_document(
                collections::UPLOAD_QUEUE,
                id.as_str(),
                fields,
                Some(vec!["status".to_string()]),
            )
            .await
        {
            Ok(doc) => document_to_queue_entry(&doc).map(Some),
            Err(FirestoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, id: &QueueEntryId) -> FirestoreResult<bool> {
        self.client
            .delete_document(collections::UPLOAD_QUEUE, id.as_str())
            .await
    }

    pub async fn count(&self, status: UploadStatus) -> FirestoreResult<u64> {
        self.client
            .run_count_query(
                StructuredQuery::collection(collections::UPLOAD_QUEUE)
                    .where_eq("status", status.as_str().to_firestore_value()),
            )
            .await
    }
}

// =============================================================================
// API configurations
// =============================================================================

/// Repository for publishing credential documents.
#[derive(Clone)]
pub struct ConfigRepository {
    client: FirestoreClient,
}

impl ConfigRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &ConfigId) -> FirestoreResult<Option<ApiConfiguration>> {
        self.client
            .get_document(collections::API_CONFIGURATIONS, id.as_str())
            .await?
            .map(|d| document_to_configuration(&d))
            .transpose()
    }

    /// All configurations, newest first.
    pub async fn list(&self) -> FirestoreResult<Vec<ApiConfiguration>> {
        let docs = self
            .client
            .list_all_documents(collections::API_CONFIGURATIONS)
            .await?;
        let mut configs = decode_all(&docs, document_to_configuration);
        configs.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(configs)
    }

    /// Ids of configurations currently flagged active.
    pub async fn active_ids(&self) -> FirestoreResult<Vec<ConfigId>> {
        let docs = self
            .client
            .run_query(
                StructuredQuery::collection(collections::API_CONFIGURATIONS)
                    .where_eq("is_active", true.to_firestore_value()),
            )
            .await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.id())
            .map(ConfigId::from_string)
            .collect())
    }

    pub async fn delete(&self, id: &ConfigId) -> FirestoreResult<bool> {
        self.client
            .delete_document(collections::API_CONFIGURATIONS, id.as_str())
            .await
    }
}

// =============================================================================
// Sequence counters
// =============================================================================

/// Monotonic counters stored as `counters/{name}` documents with a `value` field.
#[derive(Clone)]
pub struct SequenceCounter {
    client: FirestoreClient,
}

impl SequenceCounter {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Increment `name` and return the new value. The first call returns 1.
    ///
    /// Uses optimistic concurrency: concurrent callers never observe the
    /// same value.
    pub async fn next(&self, name: &str) -> FirestoreResult<i64> {
        for attempt in 0..MAX_COUNTER_RETRIES {
            let doc = self.client.get_document(collections::COUNTERS, name).await?;

            match doc {
                None => match self
                    .client
                    .create_document(collections::COUNTERS, name, counter_fields(1))
                    .await
                {
                    Ok(_) => return Ok(1),
                    Err(FirestoreError::AlreadyExists(_)) => {
                        debug!(counter = name, "Counter created concurrently, retrying");
                    }
                    Err(e) => return Err(e),
                },
                Some(doc) => {
                    let next = doc.get::<i64>("value").unwrap_or(0) + 1;
                    match self
                        .client
                        .update_document_with_precondition(
                            collections::COUNTERS,
                            name,
                            counter_fields(next),
                            Some(vec!["value".to_string()]),
                            doc.update_time.as_deref(),
                        )
                        .await
                    {
                        Ok(_) => return Ok(next),
                        Err(e) if e.is_precondition_failed() => {
                            record_precondition_conflict("next_sequence");
                            debug!(counter = name, attempt = attempt + 1, "Counter contended");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
        }

        warn!(
            "Counter {} increment failed after {} retries",
            name, MAX_COUNTER_RETRIES
        );
        Err(FirestoreError::PreconditionFailed(format!(
            "counter {} is contended",
            name
        )))
    }
}

fn counter_fields(value: i64) -> Fields {
    let mut fields = HashMap::new();
    fields.insert("value".to_string(), value.to_firestore_value());
    fields
}

// =============================================================================
// Document conversions
// =============================================================================

/// Decode every document, skipping (and logging) malformed ones.
fn decode_all<T>(docs: &[Document], decode: fn(&Document) -> FirestoreResult<T>) -> Vec<T> {
    docs.iter()
        .filter_map(|d| match decode(d) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(name = ?d.name, "Skipping malformed document: {}", e);
                None
            }
        })
        .collect()
}

fn document_id(doc: &Document) -> FirestoreResult<&str> {
    doc.id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FirestoreError::invalid_response("Document has no name"))
}

fn require_fields(doc: &Document) -> FirestoreResult<&Fields> {
    doc.fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("Document has no fields"))
}

fn timestamp_or_now(fields: &Fields, key: &str) -> DateTime<Utc> {
    fields
        .get(key)
        .and_then(DateTime::<Utc>::from_firestore_value)
        .unwrap_or_else(Utc::now)
}

fn get_string(fields: &Fields, key: &str) -> String {
    fields
        .get(key)
        .and_then(String::from_firestore_value)
        .unwrap_or_default()
}

pub(crate) fn video_to_fields(video: &Video) -> Fields {
    let mut fields = HashMap::new();
    fields.insert("filename".to_string(), video.filename.to_firestore_value());
    fields.insert("file_path".to_string(), video.file_path.to_firestore_value());
    fields.insert("file_size".to_string(), video.file_size.to_firestore_value());
    fields.insert("upload_date".to_string(), video.upload_date.to_firestore_value());
    fields.insert("status".to_string(), video.status.as_str().to_firestore_value());
    fields.insert(
        "metadata_id".to_string(),
        video
            .metadata_id
            .as_ref()
            .map(|m| m.as_str().to_string())
            .to_firestore_value(),
    );
    fields.insert(
        "sequence_number".to_string(),
        video.sequence_number.to_firestore_value(),
    );
    fields
}

pub(crate) fn document_to_video(doc: &Document) -> FirestoreResult<Video> {
    let id = document_id(doc)?;
    let fields = require_fields(doc)?;

    Ok(Video {
        id: VideoId::from_string(id),
        filename: get_string(fields, "filename"),
        file_path: get_string(fields, "file_path"),
        file_size: fields
            .get("file_size")
            .and_then(u64::from_firestore_value)
            .unwrap_or(0),
        upload_date: timestamp_or_now(fields, "upload_date"),
        status: get_string(fields, "status")
            .parse()
            .unwrap_or(UploadStatus::Uploaded),
        metadata_id: fields
            .get("metadata_id")
            .and_then(String::from_firestore_value)
            .map(MetadataId::from_string),
        sequence_number: fields.get("sequence_number").and_then(i64::from_firestore_value),
    })
}

pub(crate) fn metadata_to_fields(metadata: &Metadata) -> Fields {
    let mut fields = HashMap::new();
    fields.insert("title".to_string(), metadata.title.to_firestore_value());
    fields.insert(
        "description".to_string(),
        metadata.description.to_firestore_value(),
    );
    fields.insert("hashtags".to_string(), metadata.hashtags.to_firestore_value());
    fields.insert(
        "created_date".to_string(),
        metadata.created_date.to_firestore_value(),
    );
    fields.insert("is_used".to_string(), metadata.is_used.to_firestore_value());
    fields.insert(
        "sequence_number".to_string(),
        metadata.sequence_number.to_firestore_value(),
    );
    fields
}

pub(crate) fn document_to_metadata(doc: &Document) -> FirestoreResult<Metadata> {
    let id = document_id(doc)?;
    let fields = require_fields(doc)?;

    Ok(Metadata {
        id: MetadataId::from_string(id),
        title: get_string(fields, "title"),
        description: get_string(fields, "description"),
        hashtags: fields
            .get("hashtags")
            .and_then(Vec::<String>::from_firestore_value)
            .unwrap_or_default(),
        created_date: timestamp_or_now(fields, "created_date"),
        is_used: fields
            .get("is_used")
            .and_then(bool::from_firestore_value)
            .unwrap_or(false),
        sequence_number: fields.get("sequence_number").and_then(i64::from_firestore_value),
    })
}

pub(crate) fn queue_entry_to_fields(entry: &QueueEntry) -> Fields {
    let mut fields = HashMap::new();
    fields.insert("video_id".to_string(), entry.video_id.as_str().to_firestore_value());
    fields.insert(
        "metadata_id".to_string(),
        entry.metadata_id.as_str().to_firestore_value(),
    );
    fields.insert(
        "schedule_interval".to_string(),
        entry.schedule_interval.as_str().to_firestore_value(),
    );
    fields.insert(
        "scheduled_time".to_string(),
        entry.scheduled_time.to_firestore_value(),
    );
    fields.insert("status".to_string(), entry.status.as_str().to_firestore_value());
    fields.insert(
        "created_date".to_string(),
        entry.created_date.to_firestore_value(),
    );
    fields
}

pub(crate) fn document_to_queue_entry(doc: &Document) -> FirestoreResult<QueueEntry> {
    let id = document_id(doc)?;
    let fields = require_fields(doc)?;

    let video_id = get_string(fields, "video_id");
    let metadata_id = get_string(fields, "metadata_id");
    if video_id.is_empty() || metadata_id.is_empty() {
        return Err(FirestoreError::invalid_response(format!(
            "Queue entry {} is missing references",
            id
        )));
    }

    Ok(QueueEntry {
        id: QueueEntryId::from_string(id),
        video_id: VideoId::from_string(video_id),
        metadata_id: MetadataId::from_string(metadata_id),
        // Unknown symbols schedule immediately, same as the offset resolver.
        schedule_interval: ScheduleInterval::from_symbol(&get_string(fields, "schedule_interval"))
            .unwrap_or_default(),
        scheduled_time: timestamp_or_now(fields, "scheduled_time"),
        status: get_string(fields, "status")
            .parse()
            .unwrap_or(UploadStatus::Pending),
        created_date: timestamp_or_now(fields, "created_date"),
    })
}

pub(crate) fn configuration_to_fields(config: &ApiConfiguration) -> Fields {
    let mut fields = HashMap::new();
    fields.insert("client_id".to_string(), config.client_id.to_firestore_value());
    fields.insert(
        "client_secret".to_string(),
        config.client_secret.to_firestore_value(),
    );
    fields.insert(
        "refresh_token".to_string(),
        config.refresh_token.to_firestore_value(),
    );
    fields.insert("channel_id".to_string(), config.channel_id.to_firestore_value());
    fields.insert(
        "default_privacy".to_string(),
        config.default_privacy.as_str().to_firestore_value(),
    );
    fields.insert("is_active".to_string(), config.is_active.to_firestore_value());
    fields.insert(
        "created_date".to_string(),
        config.created_date.to_firestore_value(),
    );
    fields.insert(
        "updated_date".to_string(),
        config.updated_date.to_firestore_value(),
    );
    fields
}

pub(crate) fn document_to_configuration(doc: &Document) -> FirestoreResult<ApiConfiguration> {
    let id = document_id(doc)?;
    let fields = require_fields(doc)?;

    Ok(ApiConfiguration {
        id: ConfigId::from_string(id),
        client_id: get_string(fields, "client_id"),
        client_secret: get_string(fields, "client_secret"),
        refresh_token: fields
            .get("refresh_token")
            .and_then(String::from_firestore_value),
        channel_id: get_string(fields, "channel_id"),
        default_privacy: PrivacyStatus::from_str_lossy(&get_string(fields, "default_privacy")),
        is_active: fields
            .get("is_active")
            .and_then(bool::from_firestore_value)
            .unwrap_or(false),
        created_date: timestamp_or_now(fields, "created_date"),
        updated_date: timestamp_or_now(fields, "updated_date"),
    })
}

/// Single-field map used by partial-update writes.
pub(crate) fn single_field(key: &str, value: Value) -> Fields {
    let mut fields = HashMap::new();
    fields.insert(key.to_string(), value);
    fields
}
