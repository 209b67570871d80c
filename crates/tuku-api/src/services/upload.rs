//! Upload orchestration
//!
//! One request walks `RECEIVED -> VALIDATING` and ends in exactly one of
//! `ACCEPTED`, `QUARANTINED` or `REJECTED`. Only an accepted upload leaves a file in
//! the public area, and only together with its database row.

use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use serde_json::json;
use uuid::Uuid;

use tuku_core::models::{
    clip_original_name, public_url, FileMeta, ImageInspection, ImageRecord, NewImageRecord,
    UploadStatus, UploadedFile,
};
use tuku_core::{AppError, ModerationVerdict};
use tuku_services::QuarantinedFile;
use tuku_storage::{keys, BlobStore};

use super::password::{check_delete_password, hash_delete_password};
use crate::error::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Received,
    Validating,
    Accepted,
    Quarantined,
    Rejected,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadState::Received => "RECEIVED",
            UploadState::Validating => "VALIDATING",
            UploadState::Accepted => "ACCEPTED",
            UploadState::Quarantined => "QUARANTINED",
            UploadState::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// Terminal state of one upload
#[derive(Debug)]
pub enum UploadOutcome {
    Accepted {
        record: ImageRecord,
        url: String,
    },
    Quarantined {
        verdict: ModerationVerdict,
        /// `None` when relocation failed; the rejection stands regardless
        hidden: Option<QuarantinedFile>,
    },
    Rejected {
        errors: Vec<String>,
        retryable: bool,
    },
}

impl UploadOutcome {
    pub fn state(&self) -> UploadState {
        match self {
            UploadOutcome::Accepted { .. } => UploadState::Accepted,
            UploadOutcome::Quarantined { .. } => UploadState::Quarantined,
            UploadOutcome::Rejected { .. } => UploadState::Rejected,
        }
    }

    pub fn into_response(self) -> ApiResponse {
        match self {
            UploadOutcome::Accepted { record, url } => ApiResponse::ok(
                "Upload successful",
                Some(json!({ "url": url, "filename": record.filename })),
            ),
            UploadOutcome::Quarantined { verdict, .. } => {
                let messages = verdict.messages();
                let reason = if messages.is_empty() {
                    "content is not compliant".to_string()
                } else {
                    messages.join(", ")
                };
                ApiResponse::rejected(
                    format!("Image audit failed: {}", reason),
                    Some(json!({
                        "conclusion": verdict.conclusion,
                        "conclusion_type": verdict.conclusion_type,
                        "details": messages,
                    })),
                )
            }
            UploadOutcome::Rejected { errors, retryable } => ApiResponse::rejected(
                errors.join("; "),
                Some(json!({ "errors": errors, "retryable": retryable })),
            ),
        }
    }
}

/// Write the received bytes to the `tmp/` area for the duration of the request.
pub async fn stage_upload(
    store: &dyn BlobStore,
    data: Bytes,
    original_name: String,
    declared_content_type: Option<String>,
) -> UploadedFile {
    let original_name = clip_original_name(&original_name);
    if data.is_empty() {
        return UploadedFile::failed(original_name, UploadStatus::NoFile);
    }

    let key = keys::tmp_key(&format!("{}.upload", Uuid::new_v4()));
    match store.put(&key, data).await {
        Ok(size) => UploadedFile {
            temp_key: key,
            original_name,
            declared_content_type,
            size,
            status: UploadStatus::Ok,
        },
        Err(e) => {
            tracing::error!(error = %e, key = %key, "Failed to stage upload");
            UploadedFile::failed(original_name, UploadStatus::CantWrite)
        }
    }
}

/// `<hex micros>_<16 hex random>.<ext>`
pub fn accepted_filename(extension: &str) -> String {
    let random: [u8; 8] = rand::rng().random();
    format!(
        "{:x}_{}.{}",
        Utc::now().timestamp_micros(),
        hex::encode(random),
        extension
    )
}

/// Drives one upload through validation into its terminal state
pub struct UploadService<'a> {
    state: &'a AppState,
}

impl<'a> UploadService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// `Err` means an infrastructure failure (500) or a bad delete password (400).
    #[tracing::instrument(skip(self, file, delete_password), fields(original_name = %file.original_name, size_bytes = file.size))]
    pub async fn process(
        &self,
        file: UploadedFile,
        delete_password: Option<&str>,
    ) -> Result<UploadOutcome, AppError> {
        let started = Instant::now();
        tracing::debug!(state = %UploadState::Received, "Upload received");

        if file.status.is_server_fault() {
            return Err(AppError::Storage(
                file.status
                    .describe()
                    .unwrap_or("Upload failed")
                    .to_string(),
            ));
        }

        // A broken transfer is reported as such, whatever else the form holds.
        if let Some(cause) = file.status.describe() {
            self.discard(&file).await;
            tracing::info!(state = %UploadState::Rejected, cause, "Upload transfer failed");
            return Ok(UploadOutcome::Rejected {
                errors: vec![cause.to_string()],
                retryable: false,
            });
        }

        let password = match check_delete_password(delete_password) {
            Ok(password) => password,
            Err(e) => {
                self.discard(&file).await;
                return Err(e);
            }
        };

        tracing::debug!(state = %UploadState::Validating, "Validating upload");
        let validation = match self.state.validator.validate(&file).await {
            Ok(validation) => validation,
            Err(e) => {
                self.discard(&file).await;
                return Err(e);
            }
        };

        let outcome = if validation.passed() {
            let inspection = validation.inspection.ok_or_else(|| {
                AppError::Internal("Validation passed without inspecting the image".to_string())
            })?;
            if let Some(verdict) = validation.verdict.as_ref().filter(|v| !v.skipped) {
                let meta = FileMeta::from_upload(&file, Some(&inspection));
                self.state.quarantine.log_audit_result(&meta, verdict, None).await;
            }
            self.accept(&file, &inspection, password).await?
        } else if let Some(verdict) = validation.verdict.filter(|_| validation.errors.is_empty()) {
            let meta = FileMeta::from_upload(&file, validation.inspection.as_ref());
            self.quarantine(&file, &meta, verdict).await
        } else {
            self.discard(&file).await;
            UploadOutcome::Rejected {
                errors: validation.errors,
                retryable: validation.retryable,
            }
        };

        tracing::info!(
            state = %outcome.state(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Upload finished"
        );
        Ok(outcome)
    }

    async fn accept(
        &self,
        file: &UploadedFile,
        inspection: &ImageInspection,
        password: &str,
    ) -> Result<UploadOutcome, AppError> {
        let delete_password_hash = match hash_delete_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                self.discard(file).await;
                return Err(e);
            }
        };

        let filename = accepted_filename(&inspection.extension);
        let target = keys::upload_key(&filename);

        if let Err(e) = self.state.store.rename(&file.temp_key, &target).await {
            self.discard(file).await;
            return Err(AppError::Storage(format!(
                "Failed to move upload into place: {}",
                e
            )));
        }

        let new_image = NewImageRecord {
            filename: filename.clone(),
            original_name: file.original_name.clone(),
            file_size: file.size as i64,
            mime_type: inspection.mime_type.clone(),
            file_path: target.clone(),
            delete_password_hash,
        };

        let record = match self.state.images.insert(new_image).await {
            Ok(record) => record,
            Err(e) => {
                // No row, no file.
                if let Err(cleanup) = self.state.store.delete(&target).await {
                    tracing::error!(error = %cleanup, key = %target, "Failed to remove orphaned upload");
                }
                return Err(e);
            }
        };

        let url = public_url(self.state.public_base_url(), &record.file_path);
        tracing::info!(filename = %record.filename, id = record.id, "Image stored");
        Ok(UploadOutcome::Accepted { record, url })
    }

    async fn quarantine(
        &self,
        file: &UploadedFile,
        meta: &FileMeta,
        verdict: ModerationVerdict,
    ) -> UploadOutcome {
        let hidden = match self.state.quarantine.move_to_hidden(&file.temp_key, meta).await {
            Ok(hidden) => Some(hidden),
            Err(e) => {
                tracing::error!(error = %e, "Quarantine failed, discarding upload");
                self.discard(file).await;
                None
            }
        };

        let logged = self
            .state
            .quarantine
            .log_audit_result(meta, &verdict, hidden.as_ref().map(|h| h.key.as_str()))
            .await;
        if !logged {
            tracing::error!(original_name = %meta.name, "Failed to record audit result");
        }

        UploadOutcome::Quarantined { verdict, hidden }
    }

    /// Best-effort removal of the staged file
    async fn discard(&self, file: &UploadedFile) {
        if file.temp_key.is_empty() {
            return;
        }
        if let Err(e) = self.state.store.delete(&file.temp_key).await {
            tracing::warn!(error = %e, key = %file.temp_key, "Failed to remove staged upload");
        }
    }
}
