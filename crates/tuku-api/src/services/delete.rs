//! Password-protected deletion

use std::sync::Arc;

use futures::FutureExt;
use tuku_core::AppError;
use tuku_storage::BlobStore;

use super::password::verify_delete_password;
use crate::state::AppState;

pub struct DeleteService<'a> {
    state: &'a AppState,
}

impl<'a> DeleteService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Remove the record and its file when `password` matches the stored hash.
    ///
    /// The row delete and the unlink share one transaction: a file that cannot be
    /// removed keeps the row. A file that is already gone is not an error.
    #[tracing::instrument(skip(self, password))]
    pub async fn delete(&self, filename: &str, password: &str) -> Result<(), AppError> {
        if filename.is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "Missing required parameters".to_string(),
            ));
        }

        let record = self
            .state
            .images
            .find_by_filename(filename)
            .await?
            .ok_or_else(|| AppError::InvalidInput("Image not found".to_string()))?;

        if !verify_delete_password(password, &record.delete_password)? {
            return Err(AppError::InvalidDeletePassword);
        }

        let store: Arc<dyn BlobStore> = self.state.store.clone();
        let key = record.file_path.clone();
        let remove_file = async move {
            match store.delete(&key).await {
                Ok(true) => Ok(()),
                Ok(false) => {
                    tracing::warn!(key = %key, "Image file already missing");
                    Ok(())
                }
                Err(e) => Err(AppError::Storage(format!("Failed to delete file: {}", e))),
            }
        }
        .boxed();

        if !self.state.images.delete_with(filename, remove_file).await? {
            // Deleted by a concurrent request between lookup and delete.
            return Err(AppError::InvalidInput("Image not found".to_string()));
        }

        tracing::info!(filename = %filename, "Image deleted");
        Ok(())
    }
}
