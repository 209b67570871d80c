use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres};
use tuku_core::{
    models::{ImageRecord, NewImageRecord},
    AppError,
};

use crate::transaction::with_transaction;

/// File removal run inside the delete transaction. An `Err` rolls the row back.
pub type RemoveFile = BoxFuture<'static, Result<(), AppError>>;

const IMAGE_COLUMNS: &str = "id, filename, original_name, file_size, mime_type, file_path, \
     upload_time, views, last_viewed, status, delete_password";

/// Storage of [`ImageRecord`] rows
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn insert(&self, image: NewImageRecord) -> Result<ImageRecord, AppError>;

    async fn find_by_filename(&self, filename: &str) -> Result<Option<ImageRecord>, AppError>;

    /// Bump the view counter and return the updated record.
    async fn record_view(&self, id: i64) -> Result<Option<ImageRecord>, AppError>;

    /// Newest first
    async fn list_recent(&self, limit: i64) -> Result<Vec<ImageRecord>, AppError>;

    /// Delete the row for `filename` and run `remove_file` in the same transaction.
    ///
    /// Returns `Ok(false)` without touching the file when no row matched.
    async fn delete_with(&self, filename: &str, remove_file: RemoveFile) -> Result<bool, AppError>;

    /// Connectivity probe for health checks
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Postgres-backed repository
#[derive(Clone)]
pub struct PgImageRepository {
    pool: PgPool,
}

impl PgImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    #[tracing::instrument(skip(self, image), fields(db.table = "images", db.operation = "insert", filename = %image.filename))]
    async fn insert(&self, image: NewImageRecord) -> Result<ImageRecord, AppError> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let record = sqlx::query_as::<Postgres, ImageRecord>(&format!(
                    r#"
                    INSERT INTO images (filename, original_name, file_size, mime_type, file_path, delete_password)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING {}
                    "#,
                    IMAGE_COLUMNS
                ))
                .bind(&image.filename)
                .bind(&image.original_name)
                .bind(image.file_size)
                .bind(&image.mime_type)
                .bind(&image.file_path)
                .bind(&image.delete_password_hash)
                .fetch_one(&mut **tx)
                .await?;
                Ok(record)
            })
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select"))]
    async fn find_by_filename(&self, filename: &str) -> Result<Option<ImageRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, ImageRecord>(&format!(
            "SELECT {} FROM images WHERE filename = $1",
            IMAGE_COLUMNS
        ))
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "update", db.record_id = %id))]
    async fn record_view(&self, id: i64) -> Result<Option<ImageRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, ImageRecord>(&format!(
            "UPDATE images SET views = views + 1, last_viewed = NOW() WHERE id = $1 RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select"))]
    async fn list_recent(&self, limit: i64) -> Result<Vec<ImageRecord>, AppError> {
        let records = sqlx::query_as::<Postgres, ImageRecord>(&format!(
            "SELECT {} FROM images ORDER BY upload_time DESC, id DESC LIMIT $1",
            IMAGE_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    #[tracing::instrument(skip(self, remove_file), fields(db.table = "images", db.operation = "delete"))]
    async fn delete_with(&self, filename: &str, remove_file: RemoveFile) -> Result<bool, AppError> {
        let filename = filename.to_string();
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let result = sqlx::query("DELETE FROM images WHERE filename = $1")
                    .bind(&filename)
                    .execute(&mut **tx)
                    .await?;

                if result.rows_affected() == 0 {
                    return Ok(false);
                }

                remove_file.await?;
                Ok(true)
            })
        })
        .await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
