//! Upload queue scheduling.
//!
//! This crate provides:
//! - The interval resolver and the sequential batch planner (pure functions)
//! - The [`QueueStore`] persistence abstraction and an in-memory store
//! - [`QueueService`], which validates requests and drives the store

pub mod error;
pub mod memory;
pub mod schedule;
pub mod service;
pub mod store;

pub use error::{SchedulerError, SchedulerResult, StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use schedule::{
    batch_offset, interval_offset, plan_sequential, resolve_offset, scheduled_time, PlannedEntry,
    IMMEDIATE_STAGGER_MINUTES,
};
pub use service::QueueService;
pub use store::{order_by_sequence, MetadataClaim, MetadataFilter, QueueStore, SequenceKind, Sequenced};
