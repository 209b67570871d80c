//! Ordered upload validation
//!
//! Structural checks run first and short-circuit on the first failure. Only a
//! structurally sound image is sent to the content censor.

use std::sync::Arc;

use tuku_core::models::{ImageInspection, UploadStatus, UploadedFile, ValidationOutcome};
use tuku_core::{AppError, ContentCensor, ModerationError, UploadLimits};
use tuku_storage::traits::BlobStore;

use crate::inspect::{decode_dimensions, sniff, DecodeFailure};

/// Client-facing validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0}")]
    Transport(&'static str),

    #[error("Unsupported file type {found}. Allowed types: {allowed}")]
    UnsupportedType { found: String, allowed: String },

    #[error("File size exceeds the {max_mb}MB limit")]
    FileTooLarge { max_mb: f64 },

    #[error("The file is not a valid image: {0}")]
    Corrupt(String),

    #[error("Image dimensions {width}x{height} are outside the allowed range {min_width}x{min_height} to {max_width}x{max_height}")]
    DimensionsOutOfRange {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("The image could not be decoded within the allowed resources")]
    DecodeLimit,

    #[error("Content audit failed: {0}")]
    ModerationFailed(String),
}

pub struct ImageValidator {
    limits: UploadLimits,
    store: Arc<dyn BlobStore>,
    censor: Arc<dyn ContentCensor>,
}

impl ImageValidator {
    pub fn new(
        limits: UploadLimits,
        store: Arc<dyn BlobStore>,
        censor: Arc<dyn ContentCensor>,
    ) -> Self {
        Self {
            limits,
            store,
            censor,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Validate a staged upload.
    ///
    /// `Err` is reserved for infrastructure faults (unreadable staging area, token
    /// acquisition). Every client-attributable problem comes back as an outcome
    /// with errors or a non-compliant verdict.
    #[tracing::instrument(skip(self, file), fields(original_name = %file.original_name, size_bytes = file.size))]
    pub async fn validate(&self, file: &UploadedFile) -> Result<ValidationOutcome, AppError> {
        if file.status != UploadStatus::Ok {
            let cause = file.status.describe().unwrap_or("Upload failed");
            return Ok(reject(ValidationError::Transport(cause)));
        }

        let data = self
            .store
            .read(&file.temp_key)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read staged upload: {}", e)))?;

        let sniffed = sniff(&data);
        if !self.limits.is_allowed_content_type(sniffed.mime_type) {
            return Ok(reject(ValidationError::UnsupportedType {
                found: sniffed.mime_type.to_string(),
                allowed: self.limits.allowed_content_types.join(", "),
            }));
        }

        if data.len() > self.limits.max_file_size_bytes {
            return Ok(reject(ValidationError::FileTooLarge {
                max_mb: self.limits.max_file_size_mb(),
            }));
        }

        let (max_width, max_height) = (self.limits.max_width, self.limits.max_height);
        let (data, decoded) = tokio::task::spawn_blocking(move || {
            let decoded = decode_dimensions(&data, max_width, max_height);
            (data, decoded)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Image decode task failed: {}", e)))?;

        let (width, height) = match decoded {
            Ok(dims) => dims,
            Err(DecodeFailure::Corrupt(reason)) => {
                return Ok(reject(ValidationError::Corrupt(reason)));
            }
            Err(DecodeFailure::TooLarge(dimensions)) => {
                return Ok(reject(self.limit_error(dimensions)));
            }
        };

        if !self.dimensions_in_range(width, height) {
            return Ok(reject(self.dimension_error(width, height)));
        }

        let inspection = ImageInspection {
            mime_type: sniffed.mime_type.to_string(),
            extension: sniffed.extension().to_string(),
            width,
            height,
        };

        match self.censor.censor(&data).await {
            Ok(verdict) => {
                if !verdict.is_compliant() {
                    tracing::info!(conclusion = %verdict.conclusion, "Image flagged by moderation");
                }
                Ok(ValidationOutcome {
                    errors: Vec::new(),
                    verdict: Some(verdict),
                    inspection: Some(inspection),
                    retryable: false,
                })
            }
            Err(ModerationError::TokenAcquisition(msg)) => Err(AppError::TokenAcquisition(msg)),
            Err(ModerationError::Io(e)) => Err(AppError::from(e)),
            Err(err) => {
                tracing::warn!(error = %err, "Content audit failed");
                let retryable = err.is_retryable();
                let detail = match err {
                    ModerationError::Unavailable(_) => {
                        "moderation service unavailable".to_string()
                    }
                    ModerationError::Api { message, .. } => message,
                    other => other.to_string(),
                };
                Ok(ValidationOutcome {
                    errors: vec![ValidationError::ModerationFailed(detail).to_string()],
                    verdict: None,
                    inspection: Some(inspection),
                    retryable,
                })
            }
        }
    }

    fn dimensions_in_range(&self, width: u32, height: u32) -> bool {
        (self.limits.min_width..=self.limits.max_width).contains(&width)
            && (self.limits.min_height..=self.limits.max_height).contains(&height)
    }

    /// A decoder limit only means the dimensions are wrong when the header says so.
    fn limit_error(&self, dimensions: Option<(u32, u32)>) -> ValidationError {
        match dimensions {
            Some((width, height)) if !self.dimensions_in_range(width, height) => {
                self.dimension_error(width, height)
            }
            _ => ValidationError::DecodeLimit,
        }
    }

    fn dimension_error(&self, width: u32, height: u32) -> ValidationError {
        ValidationError::DimensionsOutOfRange {
            width,
            height,
            min_width: self.limits.min_width,
            min_height: self.limits.min_height,
            max_width: self.limits.max_width,
            max_height: self.limits.max_height,
        }
    }
}

fn reject(error: ValidationError) -> ValidationOutcome {
    tracing::debug!(reason = %error, "Upload failed validation");
    ValidationOutcome::failed(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage, Rgba};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tuku_core::{ModerationVerdict, Verdict, VerdictDetail};
    use tuku_storage::memory::MemoryBlobStore;

    enum Script {
        Pass,
        Flag,
        Unavailable,
        ApiError,
        NoToken,
    }

    struct ScriptedCensor {
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedCensor {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContentCensor for ScriptedCensor {
        async fn censor(&self, _image: &[u8]) -> Result<ModerationVerdict, ModerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Pass => Ok(ModerationVerdict::pass_through()),
                Script::Flag => Ok(ModerationVerdict {
                    verdict: Verdict::NonCompliant(vec![VerdictDetail {
                        category: 1,
                        sub_category: Some(0),
                        message: "explicit content".to_string(),
                        probability: Some(0.99),
                    }]),
                    conclusion: "不合规".to_string(),
                    conclusion_type: Some(2),
                    log_id: Some(7),
                    skipped: false,
                }),
                Script::Unavailable => Err(ModerationError::Unavailable("HTTP 503".to_string())),
                Script::ApiError => Err(ModerationError::Api {
                    code: 216201,
                    message: "image format error".to_string(),
                }),
                Script::NoToken => Err(ModerationError::TokenAcquisition("bad client".to_string())),
            }
        }
    }

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    async fn stage(store: &MemoryBlobStore, data: Vec<u8>, name: &str) -> UploadedFile {
        let key = format!("tmp/{}.upload", name);
        let size = store.put(&key, Bytes::from(data)).await.unwrap();
        UploadedFile {
            temp_key: key,
            original_name: name.to_string(),
            declared_content_type: Some("image/jpeg".to_string()),
            size,
            status: UploadStatus::Ok,
        }
    }

    fn validator(store: &MemoryBlobStore, censor: Arc<ScriptedCensor>) -> ImageValidator {
        ImageValidator::new(UploadLimits::default(), Arc::new(store.clone()), censor)
    }

    #[tokio::test]
    async fn test_valid_jpeg_passes() {
        let store = MemoryBlobStore::new();
        let censor = ScriptedCensor::new(Script::Pass);
        let file = stage(&store, encode(100, 100, ImageFormat::Jpeg), "cat.jpg").await;

        let outcome = validator(&store, censor.clone()).validate(&file).await.unwrap();
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
        let inspection = outcome.inspection.unwrap();
        assert_eq!(inspection.mime_type, "image/jpeg");
        assert_eq!(inspection.extension, "jpg");
        assert_eq!((inspection.width, inspection.height), (100, 100));
        assert_eq!(censor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_boundary_dimensions_pass() {
        let store = MemoryBlobStore::new();
        let censor = ScriptedCensor::new(Script::Pass);
        let v = validator(&store, censor);

        let min = stage(&store, encode(50, 50, ImageFormat::Png), "min.png").await;
        assert!(v.validate(&min).await.unwrap().passed());

        let max = stage(&store, encode(10_000, 50, ImageFormat::Png), "wide.png").await;
        assert!(v.validate(&max).await.unwrap().passed());
    }

    #[tokio::test]
    async fn test_dimensions_out_of_range_rejected() {
        let store = MemoryBlobStore::new();
        let censor = ScriptedCensor::new(Script::Pass);
        let v = validator(&store, censor.clone());

        let small = stage(&store, encode(49, 100, ImageFormat::Png), "small.png").await;
        let outcome = v.validate(&small).await.unwrap();
        assert!(!outcome.passed());
        assert!(outcome.errors[0].contains("dimensions"));

        let wide = stage(&store, encode(10_001, 50, ImageFormat::Png), "huge.png").await;
        let outcome = v.validate(&wide).await.unwrap();
        assert!(outcome.errors[0].contains("10001x50"));

        assert_eq!(censor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_decoder_limit_within_range_is_not_a_dimension_error() {
        let store = MemoryBlobStore::new();
        let v = validator(&store, ScriptedCensor::new(Script::Pass));

        assert_eq!(v.limit_error(Some((9_000, 9_000))), ValidationError::DecodeLimit);
        assert_eq!(v.limit_error(None), ValidationError::DecodeLimit);
        assert!(matches!(
            v.limit_error(Some((10_001, 50))),
            ValidationError::DimensionsOutOfRange { width: 10_001, .. }
        ));
    }

    #[tokio::test]
    async fn test_sixteen_bit_image_in_range_passes() {
        let store = MemoryBlobStore::new();
        let img =
            ImageBuffer::<Rgba<u16>, Vec<u16>>::from_pixel(120, 90, Rgba([1, 2, 3, 65_535]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        let file = stage(&store, png, "deep.png").await;

        let outcome = validator(&store, ScriptedCensor::new(Script::Pass))
            .validate(&file)
            .await
            .unwrap();
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
        let inspection = outcome.inspection.unwrap();
        assert_eq!((inspection.width, inspection.height), (120, 90));
    }

    #[tokio::test]
    async fn test_type_is_sniffed_not_declared() {
        let store = MemoryBlobStore::new();
        let censor = ScriptedCensor::new(Script::Pass);
        let file = stage(&store, b"<?php system($_GET['c']); ?>".to_vec(), "shell.jpg").await;

        let outcome = validator(&store, censor.clone()).validate(&file).await.unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("application/octet-stream"));
        assert!(outcome.errors[0].contains("image/png"));
        assert_eq!(censor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disallowed_image_format_rejected() {
        let store = MemoryBlobStore::new();
        let file = stage(&store, encode(60, 60, ImageFormat::Bmp), "a.bmp").await;
        let outcome = validator(&store, ScriptedCensor::new(Script::Pass))
            .validate(&file)
            .await
            .unwrap();
        assert!(outcome.errors[0].contains("image/bmp"));
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let store = MemoryBlobStore::new();
        let limits = UploadLimits {
            max_file_size_bytes: 100,
            ..UploadLimits::default()
        };
        let v = ImageValidator::new(
            limits,
            Arc::new(store.clone()),
            ScriptedCensor::new(Script::Pass),
        );
        let file = stage(&store, encode(100, 100, ImageFormat::Png), "big.png").await;
        let outcome = v.validate(&file).await.unwrap();
        assert!(outcome.errors[0].contains("MB limit"));
    }

    #[tokio::test]
    async fn test_truncated_image_rejected() {
        let store = MemoryBlobStore::new();
        let mut data = encode(100, 100, ImageFormat::Png);
        data.truncate(data.len() / 2);
        let file = stage(&store, data, "broken.png").await;
        let outcome = validator(&store, ScriptedCensor::new(Script::Pass))
            .validate(&file)
            .await
            .unwrap();
        assert!(outcome.errors[0].starts_with("The file is not a valid image"));
    }

    #[tokio::test]
    async fn test_transport_failure_short_circuits() {
        let store = MemoryBlobStore::new();
        let file = UploadedFile::failed("x.png", UploadStatus::Partial);
        let outcome = validator(&store, ScriptedCensor::new(Script::Pass))
            .validate(&file)
            .await
            .unwrap();
        assert_eq!(outcome.errors, vec!["The file was only partially uploaded".to_string()]);
    }

    #[tokio::test]
    async fn test_flagged_content_is_soft_failure() {
        let store = MemoryBlobStore::new();
        let file = stage(&store, encode(100, 100, ImageFormat::Png), "flag.png").await;
        let outcome = validator(&store, ScriptedCensor::new(Script::Flag))
            .validate(&file)
            .await
            .unwrap();
        assert!(outcome.errors.is_empty());
        assert!(outcome.is_soft_failure());
        assert_eq!(outcome.verdict.unwrap().messages(), vec!["explicit content".to_string()]);
    }

    #[tokio::test]
    async fn test_moderation_outage_is_retryable_rejection() {
        let store = MemoryBlobStore::new();
        let file = stage(&store, encode(100, 100, ImageFormat::Png), "a.png").await;
        let outcome = validator(&store, ScriptedCensor::new(Script::Unavailable))
            .validate(&file)
            .await
            .unwrap();
        assert_eq!(
            outcome.errors,
            vec!["Content audit failed: moderation service unavailable".to_string()]
        );
        assert!(outcome.retryable);
        assert!(outcome.verdict.is_none());
    }

    #[tokio::test]
    async fn test_moderation_api_error_is_not_retryable() {
        let store = MemoryBlobStore::new();
        let file = stage(&store, encode(100, 100, ImageFormat::Png), "a.png").await;
        let outcome = validator(&store, ScriptedCensor::new(Script::ApiError))
            .validate(&file)
            .await
            .unwrap();
        assert_eq!(outcome.errors, vec!["Content audit failed: image format error".to_string()]);
        assert!(!outcome.retryable);
    }

    #[tokio::test]
    async fn test_token_failure_is_infrastructure_error() {
        let store = MemoryBlobStore::new();
        let file = stage(&store, encode(100, 100, ImageFormat::Png), "a.png").await;
        let err = validator(&store, ScriptedCensor::new(Script::NoToken))
            .validate(&file)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenAcquisition(_)));
    }

    #[tokio::test]
    async fn test_missing_staged_file_is_storage_error() {
        let store = MemoryBlobStore::new();
        let file = UploadedFile {
            temp_key: "tmp/gone.upload".to_string(),
            original_name: "gone.png".to_string(),
            declared_content_type: None,
            size: 10,
            status: UploadStatus::Ok,
        };
        let err = validator(&store, ScriptedCensor::new(Script::Pass))
            .validate(&file)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
