use chrono::Utc;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tuku_core::models::CachedToken;
use tuku_core::{ModerationConfig, ModerationError};

/// Lifetime assumed when the provider omits `expires_in` (30 days)
const DEFAULT_EXPIRES_IN_SECS: i64 = 2_592_000;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// On-disk cache of the moderation provider's bearer token.
///
/// Concurrent refreshes may race; the last writer wins and every writer stores a
/// valid token, so no locking is done.
#[derive(Debug, Clone)]
pub struct TokenCache {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cache_path: PathBuf,
}

impl TokenCache {
    pub fn new(config: &ModerationConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cache_path: config.token_cache_path.clone(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Cached token if still valid, otherwise a freshly fetched one.
    pub async fn get_valid_token(&self) -> Result<String, ModerationError> {
        let now = Utc::now().timestamp();
        if let Some(cached) = self.read_cached().await {
            if cached.is_valid_at(now) {
                tracing::debug!(expires_at = cached.expires_at, "Using cached moderation token");
                return Ok(cached.access_token);
            }
            tracing::debug!(expires_at = cached.expires_at, "Cached moderation token expired");
        }

        Ok(self.refresh().await?.access_token)
    }

    /// Fetch a new token via the client-credentials grant and persist it.
    pub async fn refresh(&self) -> Result<CachedToken, ModerationError> {
        let response = self
            .http
            .get(&self.token_url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                ModerationError::TokenAcquisition(format!("token request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ModerationError::TokenAcquisition(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ModerationError::TokenAcquisition(format!("invalid token response: {}", e))
        })?;

        let access_token = match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                let reason = parsed
                    .error_description
                    .or(parsed.error)
                    .unwrap_or_else(|| "response has no access_token".to_string());
                return Err(ModerationError::TokenAcquisition(reason));
            }
        };

        let token = CachedToken::new(
            access_token,
            Utc::now().timestamp(),
            parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        );

        if let Err(e) = self.persist(&token).await {
            // The token itself is fine; the next request will simply fetch again.
            tracing::warn!(
                error = %e,
                path = %self.cache_path.display(),
                "Failed to persist moderation token"
            );
        }

        tracing::info!(expires_at = token.expires_at, "Moderation token refreshed");
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.cache_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, "Failed to remove cached moderation token");
            }
        }
    }

    async fn read_cached(&self) -> Option<CachedToken> {
        let raw = tokio::fs::read(&self.cache_path).await.ok()?;
        match serde_json::from_slice::<CachedToken>(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring corrupt moderation token cache");
                None
            }
        }
    }

    async fn persist(&self, token: &CachedToken) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(token)?;
        let path = self.cache_path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &json))
            .await
            .map_err(std::io::Error::other)?
    }
}

/// Replace `path` through a uniquely named sibling, so readers only ever see a
/// complete record even when several writers race.
fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
