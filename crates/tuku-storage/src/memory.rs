//! In-memory blob store for tests

use crate::traits::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// HashMap-backed [`BlobStore`]. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    fail_deletes: Arc<AtomicBool>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `delete` of an existing key fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Keys currently stored under `area/`, sorted
    pub fn keys_in(&self, area: &str) -> Vec<String> {
        let prefix = format!("{}/", area);
        let mut keys: Vec<String> = self
            .lock()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bytes>> {
        // A poisoned map is still usable for test purposes.
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_key(key: &str) -> StorageResult<()> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|s| s == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<u64> {
        Self::check_key(key)?;
        let len = data.len() as u64;
        self.lock().insert(key.to_string(), data);
        Ok(len)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        Self::check_key(key)?;
        self.lock()
            .get(key)
            .map(|b| b.to_vec())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<u64> {
        Self::check_key(from)?;
        Self::check_key(to)?;
        let mut files = self.lock();
        let data = files
            .get(from)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        let len = data.len() as u64;
        files.insert(to.to_string(), data);
        Ok(len)
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        Self::check_key(from)?;
        Self::check_key(to)?;
        let mut files = self.lock();
        let data = files
            .remove(from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Self::check_key(key)?;
        let mut files = self.lock();
        if !files.contains_key(key) {
            return Ok(false);
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!(
                "Simulated delete failure for {}",
                key
            )));
        }
        files.remove(key);
        Ok(true)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Self::check_key(key)?;
        Ok(self.lock().contains_key(key))
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        Self::check_key(key)?;
        self.lock()
            .get(key)
            .map(|b| b.len() as u64)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn ensure_area(&self, _area: &str) -> StorageResult<()> {
        Ok(())
    }
}
