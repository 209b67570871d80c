//! Content moderation seam
//!
//! The validator only sees [`ContentCensor`]; the HTTP provider lives in
//! `tuku-services` and tests plug in scripted censors.

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

/// One flagged category reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct VerdictDetail {
    /// Provider category code (`type` in the provider payload)
    pub category: i64,
    pub sub_category: Option<i64>,
    pub message: String,
    pub probability: Option<f64>,
}

/// Moderation outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "details", rename_all = "snake_case")]
pub enum Verdict {
    Compliant,
    NonCompliant(Vec<VerdictDetail>),
    /// The provider is unsure and asks for manual review
    Review(Vec<VerdictDetail>),
}

/// Verdict plus the raw provider fields kept for the audit log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationVerdict {
    pub verdict: Verdict,
    /// Conclusion string exactly as the provider sent it
    pub conclusion: String,
    pub conclusion_type: Option<i64>,
    pub log_id: Option<u64>,
    /// True when moderation is disabled and no provider call was made
    pub skipped: bool,
}

impl ModerationVerdict {
    /// Sentinel pass returned when moderation is administratively disabled.
    pub fn pass_through() -> Self {
        Self {
            verdict: Verdict::Compliant,
            conclusion: "skipped".to_string(),
            conclusion_type: None,
            log_id: None,
            skipped: true,
        }
    }

    pub fn is_compliant(&self) -> bool {
        matches!(self.verdict, Verdict::Compliant)
    }

    pub fn details(&self) -> &[VerdictDetail] {
        match &self.verdict {
            Verdict::Compliant => &[],
            Verdict::NonCompliant(details) | Verdict::Review(details) => details,
        }
    }

    /// Human-readable violation messages, in provider order
    pub fn messages(&self) -> Vec<String> {
        self.details()
            .iter()
            .filter(|d| !d.message.is_empty())
            .map(|d| d.message.clone())
            .collect()
    }
}

/// Errors raised while talking to the moderation provider
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("Failed to acquire moderation access token: {0}")]
    TokenAcquisition(String),

    /// Non-200 response, transport error or timeout
    #[error("Moderation service unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with an explicit `error_code`
    #[error("Moderation API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Failed to read image for moderation: {0}")]
    Io(#[from] std::io::Error),
}

impl ModerationError {
    /// Whether the caller may simply try the same upload again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModerationError::Unavailable(_))
    }
}

/// Anything able to judge image content
#[async_trait]
pub trait ContentCensor: Send + Sync {
    async fn censor(&self, image: &[u8]) -> Result<ModerationVerdict, ModerationError>;
}
