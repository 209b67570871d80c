use crate::traits::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store rooted at one directory
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create the store, creating `base_path` if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a key to a filesystem path, refusing anything that could leave the root.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(self.base_path.join(relative))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;
        let start = Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob written"
        );

        Ok(data.len() as u64)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::ReadFailed(format!("Failed to read file {}: {}", path.display(), e)),
        })
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<u64> {
        let src = self.key_to_path(from)?;
        let dst = self.key_to_path(to)?;
        self.ensure_parent_dir(&dst).await?;

        let written = fs::copy(&src, &dst).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(from.to_string()),
            _ => StorageError::WriteFailed(format!(
                "Failed to copy {} to {}: {}",
                src.display(),
                dst.display(),
                e
            )),
        })?;

        tracing::debug!(from = %from, to = %to, size_bytes = written, "Blob copied");
        Ok(written)
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let src = self.key_to_path(from)?;
        let dst = self.key_to_path(to)?;
        self.ensure_parent_dir(&dst).await?;

        match fs::rename(&src, &dst).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(from.to_string()));
            }
            // Different filesystem: fall back to copy + remove.
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                fs::copy(&src, &dst).await?;
                fs::remove_file(&src).await?;
            }
            Err(e) => {
                return Err(StorageError::WriteFailed(format!(
                    "Failed to move {} to {}: {}",
                    src.display(),
                    dst.display(),
                    e
                )));
            }
        }

        tracing::debug!(from = %from, to = %to, "Blob moved");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), key = %key, "Blob deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let meta = fs::metadata(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::ReadFailed(e.to_string()),
        })?;
        Ok(meta.len())
    }

    async fn ensure_area(&self, area: &str) -> StorageResult<()> {
        let path = self.key_to_path(area)?;
        fs::create_dir_all(&path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage area {}: {}",
                path.display(),
                e
            ))
        })
    }
}
