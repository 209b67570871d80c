//! Provider payload decoding

use serde::Deserialize;
use tuku_core::{ModerationError, ModerationVerdict, Verdict, VerdictDetail};

const CONCLUSION_COMPLIANT: &str = "合规";
const CONCLUSION_NON_COMPLIANT: &str = "不合规";
const CONCLUSION_SUSPECTED: &str = "疑似";
const CONCLUSION_AUDIT_FAILED: &str = "审核失败";

/// Provider codes meaning the access token is invalid or expired
const TOKEN_ERROR_CODES: [i64; 2] = [110, 111];

#[derive(Debug, Deserialize)]
pub(crate) struct CensorItem {
    #[serde(rename = "type")]
    pub kind: Option<i64>,
    #[serde(rename = "subType")]
    pub sub_type: Option<i64>,
    pub msg: Option<String>,
    pub probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensorResponse {
    pub log_id: Option<u64>,
    pub error_code: Option<i64>,
    pub error_msg: Option<String>,
    pub conclusion: Option<String>,
    #[serde(rename = "conclusionType")]
    pub conclusion_type: Option<i64>,
    #[serde(default)]
    pub data: Vec<CensorItem>,
}

impl CensorResponse {
    /// The provider refused the token itself
    pub fn is_token_error(&self) -> bool {
        self.error_code
            .is_some_and(|code| TOKEN_ERROR_CODES.contains(&code))
    }

    pub fn into_verdict(self) -> Result<ModerationVerdict, ModerationError> {
        if let Some(code) = self.error_code {
            return Err(ModerationError::Api {
                code,
                message: self
                    .error_msg
                    .unwrap_or_else(|| "unknown provider error".to_string()),
            });
        }

        let conclusion = self.conclusion.ok_or_else(|| ModerationError::Api {
            code: 0,
            message: "response has no conclusion".to_string(),
        })?;

        let details: Vec<VerdictDetail> = self
            .data
            .into_iter()
            .map(|item| VerdictDetail {
                category: item.kind.unwrap_or_default(),
                sub_category: item.sub_type,
                message: item.msg.unwrap_or_default(),
                probability: item.probability,
            })
            .collect();

        let verdict = match conclusion.as_str() {
            CONCLUSION_COMPLIANT => Verdict::Compliant,
            CONCLUSION_NON_COMPLIANT => Verdict::NonCompliant(details),
            CONCLUSION_SUSPECTED => Verdict::Review(details),
            CONCLUSION_AUDIT_FAILED => {
                return Err(ModerationError::Api {
                    code: self.conclusion_type.unwrap_or_default(),
                    message: "provider could not audit the image".to_string(),
                });
            }
            other => {
                // Unknown conclusions fail closed.
                tracing::warn!(conclusion = %other, "Unrecognized moderation conclusion");
                Verdict::NonCompliant(details)
            }
        };

        Ok(ModerationVerdict {
            verdict,
            conclusion,
            conclusion_type: self.conclusion_type,
            log_id: self.log_id,
            skipped: false,
        })
    }
}
