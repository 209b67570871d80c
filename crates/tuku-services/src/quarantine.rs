//! Quarantine of rejected uploads and the monthly audit log
//!
//! Rejected files are copied into the `quarantine/` area of the blob store, which is
//! never routed publicly. Audit lines go to `<log_dir>/tuku_YYYY-MM.log` in the form
//! `[YYYY-MM-DD HH:MM:SS][SEVERITY] message {json}`.

use chrono::Local;
use rand::Rng;
use serde_json::{json, Value};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tuku_core::models::FileMeta;
use tuku_core::ModerationVerdict;
use tuku_storage::{keys, BlobStore};

/// Audit line severity tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Audit,
    Error,
    Operation,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Audit => "AUDIT",
            Severity::Error => "ERROR",
            Severity::Operation => "OPERATION",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuarantineError {
    #[error("Source file is missing or unreadable: {0}")]
    SourceUnreadable(String),

    #[error("Failed to copy file into quarantine: {0}")]
    CopyFailed(String),

    #[error("Quarantine copy verification failed: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Where a rejected file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantinedFile {
    /// Blob-store key, `quarantine/<filename>`
    pub key: String,
    pub filename: String,
}

/// Moves rejected uploads out of reach and keeps the audit trail
pub struct QuarantineLogger {
    store: Arc<dyn BlobStore>,
    log_dir: PathBuf,
    // Queues this process's appends; the OS file lock covers other processes.
    write_lock: Mutex<()>,
}

impl QuarantineLogger {
    pub fn new(store: Arc<dyn BlobStore>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            log_dir: log_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Log file for the current month
    pub fn current_log_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("tuku_{}.log", Local::now().format("%Y-%m")))
    }

    /// Copy `source_key` into quarantine, verify the copy, then remove the source.
    pub async fn move_to_hidden(
        &self,
        source_key: &str,
        meta: &FileMeta,
    ) -> Result<QuarantinedFile, QuarantineError> {
        match self.relocate(source_key, meta).await {
            Ok(moved) => {
                self.log(
                    Severity::Operation,
                    "File moved to quarantine",
                    json!({ "source": source_key, "target": moved.key }),
                )
                .await;
                Ok(moved)
            }
            Err(e) => {
                self.log(
                    Severity::Error,
                    &format!("Failed to move file to quarantine: {}", e),
                    json!({ "source": source_key, "error": e.to_string() }),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn relocate(
        &self,
        source_key: &str,
        meta: &FileMeta,
    ) -> Result<QuarantinedFile, QuarantineError> {
        let expected = self
            .store
            .size(source_key)
            .await
            .map_err(|e| QuarantineError::SourceUnreadable(e.to_string()))?;

        let filename = quarantine_filename(&meta.extension);
        let target = keys::quarantine_key(&filename);

        // Copy rather than rename so the areas may live on different filesystems.
        self.store
            .copy(source_key, &target)
            .await
            .map_err(|e| QuarantineError::CopyFailed(e.to_string()))?;

        let actual = self.store.size(&target).await.unwrap_or(0);
        if actual != expected {
            if let Err(e) = self.store.delete(&target).await {
                tracing::warn!(error = %e, target = %target, "Failed to remove bad quarantine copy");
            }
            return Err(QuarantineError::SizeMismatch { expected, actual });
        }

        if let Err(e) = self.store.delete(source_key).await {
            self.log(
                Severity::Error,
                "Failed to delete source file",
                json!({ "source": source_key, "error": e.to_string() }),
            )
            .await;
        }

        tracing::info!(
            source = %source_key,
            target = %target,
            size_bytes = expected,
            "Rejected upload quarantined"
        );

        Ok(QuarantinedFile {
            key: target,
            filename,
        })
    }

    /// Record a moderation verdict. Returns `false` if the entry could not be written.
    pub async fn log_audit_result(
        &self,
        meta: &FileMeta,
        verdict: &ModerationVerdict,
        quarantine_path: Option<&str>,
    ) -> bool {
        let mut context = json!({
            "file": meta,
            "conclusion": verdict.conclusion,
            "conclusion_type": verdict.conclusion_type,
        });

        let message = if verdict.is_compliant() {
            "Image audit passed"
        } else {
            context["details"] = json!(verdict.details());
            if let Some(path) = quarantine_path {
                context["hidden_path"] = json!(path);
            }
            "Image audit failed"
        };

        self.log(Severity::Audit, message, context).await
    }

    /// Append one audit line. Failures are reported through tracing and returned as `false`.
    pub async fn log(&self, severity: Severity, message: &str, context: Value) -> bool {
        let line = format_line(
            &Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            severity,
            message,
            &context,
        );

        let _guard = self.write_lock.lock().await;
        match self.append(line).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    log_dir = %self.log_dir.display(),
                    severity = %severity,
                    "Failed to write audit log entry"
                );
                false
            }
        }
    }

    async fn append(&self, line: String) -> std::io::Result<()> {
        let log_dir = self.log_dir.clone();
        let path = self.current_log_path();
        tokio::task::spawn_blocking(move || append_locked(&log_dir, &path, line.as_bytes()))
            .await
            .map_err(std::io::Error::other)?
    }
}

/// Append under an exclusive OS lock, so instances sharing the log directory never
/// interleave lines. The lock is released when the file is closed.
fn append_locked(log_dir: &Path, path: &Path, line: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.lock()?;
    file.write_all(line)?;
    file.flush()
}

fn format_line(timestamp: &str, severity: Severity, message: &str, context: &Value) -> String {
    let has_context = match context {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    };
    if has_context {
        format!("[{}][{}] {} {}\n", timestamp, severity, message, context)
    } else {
        format!("[{}][{}] {}\n", timestamp, severity, message)
    }
}

/// `YYYYmmdd_HHMMSS_<16 hex>.<ext>`
fn quarantine_filename(extension: &str) -> String {
    let ext: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(10)
        .collect::<String>()
        .to_lowercase();
    let ext = if ext.is_empty() { "jpg".to_string() } else { ext };

    let random: [u8; 8] = rand::rng().random();
    format!(
        "{}_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        hex::encode(random),
        ext
    )
}
