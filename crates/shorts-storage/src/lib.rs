//! Local disk storage for uploaded videos.
//!
//! This crate provides:
//! - Upload policy (allowed extensions, size ceiling)
//! - Streaming writes that abort as soon as the ceiling is crossed
//! - Deletion of stored files

pub mod error;
pub mod policy;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use policy::{UploadPolicy, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_UPLOAD_BYTES};
pub use store::{sanitize_filename, StoredUpload, UploadStore};
