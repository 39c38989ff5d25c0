//! Streaming upload store on the local filesystem.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use futures_util::{pin_mut, Stream, StreamExt};
use regex_lite::Regex;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::policy::UploadPolicy;

/// A file that was fully written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Random id used as the filename prefix
    pub id: String,
    /// Client filename without any directory part
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Writes uploads under a single root directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    policy: UploadPolicy,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, policy: UploadPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Create the root directory if missing.
    pub async fn ensure_root(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Validate `filename`, then stream `chunks` to `{root}/{uuid}_{name}`.
    ///
    /// The byte count is checked after every chunk. On any failure the
    /// partial file is removed before the error is returned.
    pub async fn store_stream<S, B, E>(&self, filename: &str, chunks: S) -> StorageResult<StoredUpload>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        self.policy.check_filename(filename)?;

        let original = base_name(filename).to_string();
        let id = Uuid::new_v4().to_string();
        let path = self
            .root
            .join(format!("{}_{}", id, sanitize_filename(&original)));

        let file = fs::File::create(&path).await?;
        let mut writer = BufWriter::new(file);

        match self.copy_chunks(&mut writer, chunks).await {
            Ok(size) => {
                info!(upload_id = %id, size, path = %path.display(), "Stored upload");
                Ok(StoredUpload {
                    id,
                    filename: original,
                    path,
                    size,
                })
            }
            Err(e) => {
                drop(writer);
                if let Err(rm) = fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %rm, "Failed to remove partial upload");
                }
                debug!(upload_id = %id, error = %e, "Upload aborted");
                Err(e)
            }
        }
    }

    async fn copy_chunks<S, B, E>(
        &self,
        writer: &mut BufWriter<fs::File>,
        chunks: S,
    ) -> StorageResult<u64>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        pin_mut!(chunks);
        let mut written: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| StorageError::upload_failed(e.to_string()))?;
            let bytes = chunk.as_ref();
            written += bytes.len() as u64;
            self.policy.check_size(written)?;
            writer.write_all(bytes).await?;
        }

        writer.flush().await?;
        Ok(written)
    }

    /// Remove a stored file. Paths outside the root are refused.
    ///
    /// Returns `false` when the file was already gone.
    pub async fn delete(&self, path: impl AsRef<Path>) -> StorageResult<bool> {
        let path = path.as_ref();
        if !path.starts_with(&self.root) {
            return Err(StorageError::InvalidPath(path.display().to_string()));
        }
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn base_name(filename: &str) -> &str {
    filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());
    let cleaned = re.replace_all(base_name(name), "_");
    cleaned.trim_start_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::TempDir;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<&'static [u8], String>> {
        stream::iter(parts.iter().map(|p| Ok(p.as_bytes())).collect::<Vec<_>>())
    }

    async fn file_count(dir: &Path) -> usize {
        let mut entries = fs::read_dir(dir).await.unwrap();
        let mut n = 0;
        while entries.next_entry().await.unwrap().is_some() {
            n += 1;
        }
        n
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my clip (1).mp4"), "my_clip__1_.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd.mp4"), "passwd.mp4");
        assert_eq!(sanitize_filename("C:\\videos\\a.mov"), "a.mov");
        assert_eq!(sanitize_filename(".hidden.mp4"), "hidden.mp4");
    }

    #[tokio::test]
    async fn test_store_stream_writes_file() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path(), UploadPolicy::default());

        let stored = store
            .store_stream("holiday.mp4", chunks(&["abc", "defg"]))
            .await
            .unwrap();

        assert_eq!(stored.size, 7);
        assert_eq!(stored.filename, "holiday.mp4");
        let name = stored.path.file_name().unwrap().to_str().unwrap().to_string();
        assert_eq!(name, format!("{}_holiday.mp4", stored.id));
        assert_eq!(fs::read(&stored.path).await.unwrap(), b"abcdefg");
    }

    #[tokio::test]
    async fn test_store_stream_aborts_over_limit() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path(), UploadPolicy::default().with_max_bytes(5));

        let err = store
            .store_stream("big.mov", chunks(&["abc", "def", "ghi"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::TooLarge(_)));
        assert_eq!(file_count(dir.path()).await, 0);
    }

    #[tokio::test]
    async fn test_store_stream_rejects_before_writing() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path(), UploadPolicy::default());

        let err = store
            .store_stream("slides.pdf", chunks(&["abc"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidExtension(_)));
        assert_eq!(file_count(dir.path()).await, 0);
    }

    #[tokio::test]
    async fn test_store_stream_source_error_cleans_up() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path(), UploadPolicy::default());
        let parts: Vec<Result<&'static [u8], String>> =
            vec![Ok("abc".as_bytes()), Err("connection reset".to_string())];

        let err = store
            .store_stream("a.avi", stream::iter(parts))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
        assert_eq!(file_count(dir.path()).await, 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path(), UploadPolicy::default());
        let stored = store
            .store_stream("a.mp4", chunks(&["x"]))
            .await
            .unwrap();

        assert!(store.delete(&stored.path).await.unwrap());
        assert!(!store.delete(&stored.path).await.unwrap());
        assert!(matches!(
            store.delete("/etc/passwd").await,
            Err(StorageError::InvalidPath(_))
        ));
    }
}
