//! Configuration module
//!
//! Every component receives the section it needs by constructor. Nothing here is
//! global: `Config::from_env` is called once in `main` and the result is passed down.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

// Common constants
const DEFAULT_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: usize = 10;
const MIN_IMAGE_DIMENSION: u32 = 50;
const MAX_IMAGE_DIMENSION: u32 = 10_000;
const MODERATION_TIMEOUT_SECS: u64 = 30;
const MODERATION_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
pub const DEFAULT_CENSOR_URL: &str =
    "https://aip.baidubce.com/rest/2.0/solution/v1/img_censor/v2/user_defined";

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    /// Prefix for public image URLs. Empty means URLs are relative (`/uploads/...`).
    pub public_base_url: String,
}

/// Postgres connection settings
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

/// On-disk locations
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Root of the blob store; holds the `tmp/`, `uploads/` and `quarantine/` areas.
    pub root: PathBuf,
    pub audit_log_dir: PathBuf,
}

/// Structural limits applied to every upload.
#[derive(Clone, Debug)]
pub struct UploadLimits {
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
            ],
            min_width: MIN_IMAGE_DIMENSION,
            min_height: MIN_IMAGE_DIMENSION,
            max_width: MAX_IMAGE_DIMENSION,
            max_height: MAX_IMAGE_DIMENSION,
        }
    }
}

impl UploadLimits {
    pub fn max_file_size_mb(&self) -> f64 {
        self.max_file_size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn is_allowed_content_type(&self, mime: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

/// External moderation provider settings
#[derive(Clone, Debug)]
pub struct ModerationConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub censor_url: String,
    pub token_cache_path: PathBuf,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

impl ModerationConfig {
    /// Moderation switched off; no provider is ever contacted.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            censor_url: DEFAULT_CENSOR_URL.to_string(),
            token_cache_path: PathBuf::from("./cache/moderation_token.json"),
            timeout_seconds: MODERATION_TIMEOUT_SECS,
            connect_timeout_seconds: MODERATION_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub limits: UploadLimits,
    pub moderation: ModerationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server = ServerConfig {
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_default(),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
        };

        let storage = StorageConfig {
            root: PathBuf::from(
                env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_string()),
            ),
            audit_log_dir: PathBuf::from(
                env::var("AUDIT_LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
            ),
        };

        let max_file_size_mb: usize = env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB);
        let limits = UploadLimits {
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_content_types: parse_list(
                &env::var("ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| "image/jpeg,image/png,image/gif".to_string()),
            ),
            min_width: env_or("MIN_IMAGE_WIDTH", MIN_IMAGE_DIMENSION),
            min_height: env_or("MIN_IMAGE_HEIGHT", MIN_IMAGE_DIMENSION),
            max_width: env_or("MAX_IMAGE_WIDTH", MAX_IMAGE_DIMENSION),
            max_height: env_or("MAX_IMAGE_HEIGHT", MAX_IMAGE_DIMENSION),
        };

        let moderation = ModerationConfig {
            enabled: env_or("MODERATION_ENABLED", false),
            client_id: env::var("MODERATION_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("MODERATION_CLIENT_SECRET").unwrap_or_default(),
            token_url: env::var("MODERATION_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            censor_url: env::var("MODERATION_CENSOR_URL")
                .unwrap_or_else(|_| DEFAULT_CENSOR_URL.to_string()),
            token_cache_path: PathBuf::from(
                env::var("MODERATION_TOKEN_CACHE")
                    .unwrap_or_else(|_| "./cache/moderation_token.json".to_string()),
            ),
            timeout_seconds: env_or("MODERATION_TIMEOUT_SECONDS", MODERATION_TIMEOUT_SECS),
            connect_timeout_seconds: env_or(
                "MODERATION_CONNECT_TIMEOUT_SECONDS",
                MODERATION_CONNECT_TIMEOUT_SECS,
            ),
        };

        Ok(Config {
            server,
            database,
            storage,
            limits,
            moderation,
        })
    }

    /// Fail fast on settings that would only surface once the first upload arrives.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS cannot be 0"));
        }

        validate_limits(&self.limits)?;

        if self.moderation.enabled
            && (self.moderation.client_id.is_empty() || self.moderation.client_secret.is_empty())
        {
            return Err(anyhow::anyhow!(
                "MODERATION_ENABLED=true requires MODERATION_CLIENT_ID and MODERATION_CLIENT_SECRET"
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn validate_limits(limits: &UploadLimits) -> Result<(), anyhow::Error> {
    if limits.max_file_size_bytes == 0 {
        return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
    }
    if limits.allowed_content_types.is_empty() {
        return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES cannot be empty"));
    }
    if limits.min_width > limits.max_width || limits.min_height > limits.max_height {
        return Err(anyhow::anyhow!(
            "Minimum image dimensions {}x{} exceed maximum {}x{}",
            limits.min_width,
            limits.min_height,
            limits.max_width,
            limits.max_height
        ));
    }
    Ok(())
}

fn env_or<T: FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
