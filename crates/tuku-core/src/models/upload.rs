use serde::Serialize;

use crate::moderation::ModerationVerdict;

/// Outcome of receiving the multipart body, before any content check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Ok,
    /// Body exceeded the transport size limit
    ExceedsLimit,
    /// Stream ended before the file was complete
    Partial,
    /// No file part, or an empty one
    NoFile,
    /// The received bytes could not be staged
    CantWrite,
}

impl UploadStatus {
    /// Human-readable cause, `None` when the transfer succeeded.
    pub fn describe(&self) -> Option<&'static str> {
        match self {
            UploadStatus::Ok => None,
            UploadStatus::ExceedsLimit => Some("File size exceeds the upload limit"),
            UploadStatus::Partial => Some("The file was only partially uploaded"),
            UploadStatus::NoFile => Some("No file was uploaded"),
            UploadStatus::CantWrite => Some("Failed to write the uploaded file"),
        }
    }

    /// Failures caused by the server rather than by the client
    pub fn is_server_fault(&self) -> bool {
        matches!(self, UploadStatus::CantWrite)
    }
}

/// A received file, staged in the blob store for the duration of one request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Blob-store key of the staged bytes (`tmp/...`)
    pub temp_key: String,
    pub original_name: String,
    /// Content type claimed by the client; informational only
    pub declared_content_type: Option<String>,
    pub size: u64,
    pub status: UploadStatus,
}

impl UploadedFile {
    /// A transfer that failed before anything was staged.
    pub fn failed(original_name: impl Into<String>, status: UploadStatus) -> Self {
        Self {
            temp_key: String::new(),
            original_name: original_name.into(),
            declared_content_type: None,
            size: 0,
            status,
        }
    }

    /// Lowercased extension of the client-supplied name
    pub fn declared_extension(&self) -> Option<String> {
        std::path::Path::new(&self.original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_lowercase())
    }
}

/// What the validator learned by actually looking at the bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInspection {
    pub mime_type: String,
    /// Canonical extension of the sniffed format
    pub extension: String,
    pub width: u32,
    pub height: u32,
}

/// Result of validating one upload
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Ordered error messages; empty means the file passed
    pub errors: Vec<String>,
    pub verdict: Option<ModerationVerdict>,
    pub inspection: Option<ImageInspection>,
    /// Set when the failure was a moderation outage worth retrying
    pub retryable: bool,
}

impl ValidationOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Default::default()
        }
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty() && !self.is_soft_failure()
    }

    /// Structurally fine but the moderator did not approve it
    pub fn is_soft_failure(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| !v.is_compliant())
    }
}

/// File description written into audit entries
#[derive(Debug, Clone, Serialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub extension: String,
}

impl FileMeta {
    pub fn from_upload(file: &UploadedFile, inspection: Option<&ImageInspection>) -> Self {
        // Prefer the client extension, then the sniffed one.
        let extension = file
            .declared_extension()
            .or_else(|| inspection.map(|i| i.extension.clone()))
            .unwrap_or_else(|| "jpg".to_string());
        Self {
            name: file.original_name.clone(),
            size: file.size,
            content_type: file.declared_content_type.clone(),
            extension,
        }
    }
}
