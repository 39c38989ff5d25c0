//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use shorts_firestore::FirestoreQueueStore;
use shorts_queue::{InMemoryStore, QueueService, QueueStore};
use shorts_storage::{UploadPolicy, UploadStore};

use crate::config::{ApiConfig, StoreBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub queue: QueueService,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    /// Build state for `config`: connect the configured store and prepare
    /// the upload directory.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn QueueStore> = match config.store_backend {
            StoreBackend::Firestore => Arc::new(
                FirestoreQueueStore::from_env()
                    .await
                    .context("Failed to connect to Firestore")?,
            ),
            StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        };
        info!(backend = config.store_backend.as_str(), "Queue store ready");

        let state = Self::with_store(config, store);
        state
            .uploads
            .ensure_root()
            .await
            .with_context(|| {
                format!(
                    "Failed to create upload directory {}",
                    state.uploads.root().display()
                )
            })?;
        Ok(state)
    }

    /// Build state around an existing store.
    pub fn with_store(config: ApiConfig, store: Arc<dyn QueueStore>) -> Self {
        let policy = UploadPolicy::default().with_max_bytes(config.max_upload_bytes);
        let uploads = UploadStore::new(config.upload_dir.clone(), policy);
        Self {
            queue: QueueService::new(store),
            uploads: Arc::new(uploads),
            config,
        }
    }
}
