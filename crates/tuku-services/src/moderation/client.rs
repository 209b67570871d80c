use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use std::path::Path;
use std::time::{Duration, Instant};
use tuku_core::{ContentCensor, ModerationConfig, ModerationError, ModerationVerdict};

use super::response::CensorResponse;
use super::token_cache::TokenCache;

enum Attempt {
    Judged(ModerationVerdict),
    TokenRejected,
}

/// Client for the external image censorship API
pub struct ModerationClient {
    enabled: bool,
    http: reqwest::Client,
    censor_url: String,
    tokens: TokenCache,
}

impl std::fmt::Debug for ModerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationClient")
            .field("enabled", &self.enabled)
            .field("censor_url", &self.censor_url)
            .finish()
    }
}

impl ModerationClient {
    pub fn new(config: &ModerationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .context("Failed to create HTTP client for moderation API")?;

        Ok(Self {
            enabled: config.enabled,
            tokens: TokenCache::new(config, http.clone()),
            http,
            censor_url: config.censor_url.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.tokens
    }

    /// Read `path` and moderate its contents.
    pub async fn censor_file(&self, path: &Path) -> Result<ModerationVerdict, ModerationError> {
        if !self.enabled {
            return Ok(ModerationVerdict::pass_through());
        }
        let bytes = tokio::fs::read(path).await?;
        self.censor_bytes(&bytes).await
    }

    /// Moderate raw image bytes.
    ///
    /// A token rejected by the provider is refreshed once and the request retried.
    pub async fn censor_bytes(&self, image: &[u8]) -> Result<ModerationVerdict, ModerationError> {
        if !self.enabled {
            return Ok(ModerationVerdict::pass_through());
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let start = Instant::now();

        let token = self.tokens.get_valid_token().await?;
        let verdict = match self.submit(&token, &encoded).await? {
            Attempt::Judged(verdict) => verdict,
            Attempt::TokenRejected => {
                tracing::info!("Moderation token rejected, refreshing once");
                self.tokens.invalidate().await;
                let fresh = self.tokens.refresh().await?;
                match self.submit(&fresh.access_token, &encoded).await? {
                    Attempt::Judged(verdict) => verdict,
                    Attempt::TokenRejected => {
                        return Err(ModerationError::Unavailable(
                            "access token rejected after refresh".to_string(),
                        ));
                    }
                }
            }
        };

        tracing::info!(
            conclusion = %verdict.conclusion,
            conclusion_type = ?verdict.conclusion_type,
            log_id = ?verdict.log_id,
            size_bytes = image.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Moderation verdict received"
        );

        Ok(verdict)
    }

    async fn submit(&self, token: &str, encoded: &str) -> Result<Attempt, ModerationError> {
        let response = self
            .http
            .post(&self.censor_url)
            .query(&[("access_token", token)])
            .form(&[("image", encoded)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModerationError::Unavailable("request timed out".to_string())
                } else {
                    ModerationError::Unavailable(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ModerationError::Unavailable(format!("failed to read response body: {}", e))
        })?;

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::TokenRejected);
        }

        if !status.is_success() {
            return Err(ModerationError::Unavailable(format!(
                "HTTP {}, response: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: CensorResponse = serde_json::from_str(&body).map_err(|e| {
            ModerationError::Unavailable(format!("unparseable response ({}): {}", e, body))
        })?;

        if parsed.is_token_error() {
            return Ok(Attempt::TokenRejected);
        }

        parsed.into_verdict().map(Attempt::Judged)
    }
}

#[async_trait]
impl ContentCensor for ModerationClient {
    async fn censor(&self, image: &[u8]) -> Result<ModerationVerdict, ModerationError> {
        self.censor_bytes(image).await
    }
}
