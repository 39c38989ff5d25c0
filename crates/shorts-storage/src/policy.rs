//! Upload acceptance rules.

use std::path::Path;

use crate::error::{StorageError, StorageResult};

/// Extensions accepted by default, lowercase with the leading dot.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = [".mp4", ".mov", ".avi"];

/// Default ceiling: 2 GiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Lowercase extensions including the dot
    pub allowed_extensions: Vec<String>,
    /// Largest accepted file in bytes
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Check the client filename and return its lowercase extension.
    pub fn check_filename(&self, filename: &str) -> StorageResult<String> {
        if filename.trim().is_empty() {
            return Err(StorageError::EmptyFilename);
        }

        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        if !self.allowed_extensions.iter().any(|allowed| *allowed == ext) {
            return Err(StorageError::InvalidExtension(self.extension_message()));
        }
        Ok(ext)
    }

    /// Fail once `size` crosses the ceiling.
    pub fn check_size(&self, size: u64) -> StorageResult<()> {
        if size > self.max_bytes {
            return Err(StorageError::TooLarge(format!(
                "File size exceeds {} limit",
                format_limit(self.max_bytes)
            )));
        }
        Ok(())
    }

    fn extension_message(&self) -> String {
        let names: Vec<String> = self
            .allowed_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_uppercase())
            .collect();
        format!("Only {} files allowed", names.join(", "))
    }
}

fn format_limit(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB && bytes % GIB == 0 {
        format!("{}GB", bytes / GIB)
    } else if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}
