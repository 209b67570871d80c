//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use tuku_core::{Config, ContentCensor};
use tuku_db::{ImageRepository, PgImageRepository};
use tuku_processing::ImageValidator;
use tuku_services::{ModerationClient, QuarantineLogger};
use tuku_storage::BlobStore;

use crate::state::AppState;
use crate::telemetry::{init_telemetry, LogFormat};

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    init_telemetry(LogFormat::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(environment = %config.server.environment, "Configuration loaded and validated");

    let pool = database::setup_database(&config).await?;
    let store = storage::setup_storage(&config).await?;

    let moderation = ModerationClient::new(&config.moderation)?;
    if !moderation.is_enabled() {
        tracing::warn!("Content moderation is disabled; every valid image will be accepted");
    }

    let state = build_state(
        config,
        Arc::new(PgImageRepository::new(pool)),
        store,
        Arc::new(moderation),
    );
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}

/// Wire the shared state from its backends.
pub fn build_state(
    config: Config,
    images: Arc<dyn ImageRepository>,
    store: Arc<dyn BlobStore>,
    censor: Arc<dyn ContentCensor>,
) -> Arc<AppState> {
    let validator = ImageValidator::new(config.limits.clone(), store.clone(), censor);
    let quarantine = QuarantineLogger::new(store.clone(), config.storage.audit_log_dir.clone());

    Arc::new(AppState {
        config,
        images,
        store,
        validator,
        quarantine,
    })
}
