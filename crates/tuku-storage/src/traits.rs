//! Blob store abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Every filesystem side effect of the upload pipeline goes through this trait.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `key`, replacing anything already there. Returns the byte count.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<u64>;

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Copy `from` to `to`, leaving the source in place. Returns bytes written.
    async fn copy(&self, from: &str, to: &str) -> StorageResult<u64>;

    /// Move `from` to `to`.
    async fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Remove `key`. Returns `false` when there was nothing to remove.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn size(&self, key: &str) -> StorageResult<u64>;

    /// Make sure the area (top-level directory) exists.
    async fn ensure_area(&self, area: &str) -> StorageResult<()>;
}
