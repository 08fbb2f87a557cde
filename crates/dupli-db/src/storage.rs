//! Blob storage backend for fetched files and generated thumbnails.
//!
//! The engine only ever needs two operations against object storage: fetch
//! the bytes behind a job's storage key and store a thumbnail. Both sit
//! behind [`StorageBackend`] so deployments can plug in S3-compatible
//! stores; the filesystem implementation here is what ships with the
//! engine and what tests run against.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use dupli_core::{Error, Result};

/// Byte fetch/store abstraction over object storage.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the bytes stored under `key`.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Write `data` under `key`, replacing any existing object.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;
}

/// Filesystem storage backend rooted at a base directory.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    /// Validate that the backend can write and read back a file.
    ///
    /// Run at startup to catch permission errors and overlayfs quirks before
    /// the first job does.
    pub async fn validate(&self) -> Result<()> {
        let key = ".health-check/probe.bin";
        let data = b"storage-health-check";
        self.write(key, data).await?;
        let read_back = self.read(key).await?;
        if read_back != data {
            return Err(Error::Storage("health-check read-back mismatch".to_string()));
        }
        let _ = fs::remove_file(self.full_path(key)).await;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.full_path(key);
        fs::read(&path)
            .await
            .map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.full_path(key);
        debug!(
            subsystem = "storage",
            component = "filesystem",
            op = "write",
            storage_key = %key,
            size = data.len(),
            "Writing object"
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("create dir {}: {}", parent.display(), e)))?;
        }

        // Atomic write: temp file + rename, so readers never see a partial
        // object after a crash.
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage(format!("create {}: {}", temp_path.display(), e)))?;
        file.write_all(data)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {}", temp_path.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Storage(format!("sync {}: {}", temp_path.display(), e)))?;
        drop(file);

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Error::Storage(format!("rename to {}: {}", path.display(), e)))?;
        Ok(())
    }
}
