//! Firestore REST API client and queue persistence.
//!
//! This crate provides:
//! - A REST client with token caching, retries and emulator support
//! - Typed repositories for videos, metadata, queue entries and configurations
//! - Atomic sequence counters
//! - [`FirestoreQueueStore`], the production [`shorts_queue::QueueStore`]

pub mod client;
pub mod error;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use repos::{
    ConfigRepository, MetadataRepository, QueueRepository, SequenceCounter, VideoRepository,
};
pub use retry::RetryConfig;
pub use store::FirestoreQueueStore;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
