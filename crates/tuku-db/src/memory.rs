//! In-memory repository for tests and local experiments

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tuku_core::{
    models::{ImageRecord, NewImageRecord, ORIGINAL_NAME_MAX_CHARS},
    AppError,
};

use crate::image::{ImageRepository, RemoveFile};

#[derive(Default)]
struct Inner {
    records: Vec<ImageRecord>,
    next_id: i64,
}

/// Vec-backed [`ImageRepository`]. Clones share the same rows.
#[derive(Clone, Default)]
pub struct InMemoryImageRepository {
    inner: Arc<Mutex<Inner>>,
    fail_inserts: Arc<AtomicBool>,
}

impl InMemoryImageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail like an unreachable database.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ImageRepository for InMemoryImageRepository {
    async fn insert(&self, image: NewImageRecord) -> Result<ImageRecord, AppError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        // Mirrors the VARCHAR(255) column
        if image.original_name.chars().count() > ORIGINAL_NAME_MAX_CHARS {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "value too long for type character varying(255)".to_string(),
            )));
        }

        let mut inner = self.lock();
        if inner.records.iter().any(|r| r.filename == image.filename) {
            return Err(AppError::InvalidInput(format!(
                "Duplicate filename {}",
                image.filename
            )));
        }

        inner.next_id += 1;
        let record = ImageRecord {
            id: inner.next_id,
            filename: image.filename,
            original_name: image.original_name,
            file_size: image.file_size,
            mime_type: image.mime_type,
            file_path: image.file_path,
            upload_time: Utc::now(),
            views: 0,
            last_viewed: None,
            status: "active".to_string(),
            delete_password: image.delete_password_hash,
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Option<ImageRecord>, AppError> {
        Ok(self
            .lock()
            .records
            .iter()
            .find(|r| r.filename == filename)
            .cloned())
    }

    async fn record_view(&self, id: i64) -> Result<Option<ImageRecord>, AppError> {
        let mut inner = self.lock();
        Ok(inner.records.iter_mut().find(|r| r.id == id).map(|r| {
            r.views += 1;
            r.last_viewed = Some(Utc::now());
            r.clone()
        }))
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ImageRecord>, AppError> {
        let mut records = self.lock().records.clone();
        records.sort_by(|a, b| b.upload_time.cmp(&a.upload_time).then(b.id.cmp(&a.id)));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn delete_with(&self, filename: &str, remove_file: RemoveFile) -> Result<bool, AppError> {
        if !self.lock().records.iter().any(|r| r.filename == filename) {
            return Ok(false);
        }

        // Row removal only becomes visible once the file side succeeded.
        remove_file.await?;

        self.lock().records.retain(|r| r.filename != filename);
        Ok(true)
    }
}
