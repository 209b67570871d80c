//! Storage provisioning
//!
//! Runs once at startup. Every step is idempotent.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tuku_core::Config;
use tuku_storage::{keys, BlobStore, LocalBlobStore};

const QUARANTINE_ACCESS_RULE: &str = "Deny from all\n";

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn BlobStore>> {
    let store = LocalBlobStore::new(&config.storage.root)
        .await
        .context("Failed to initialize local storage")?;
    provision(&store, config).await?;

    tracing::info!(root = %store.base_path().display(), "Storage ready");
    Ok(Arc::new(store))
}

/// Create the storage areas, the log and cache directories and the quarantine
/// deny-all rule.
pub async fn provision(store: &dyn BlobStore, config: &Config) -> Result<()> {
    for area in keys::ALL_AREAS {
        store
            .ensure_area(area)
            .await
            .with_context(|| format!("Failed to create storage area {}", area))?;
    }

    let rule = keys::quarantine_key(".htaccess");
    if !store.exists(&rule).await? {
        store
            .put(&rule, Bytes::from_static(QUARANTINE_ACCESS_RULE.as_bytes()))
            .await
            .context("Failed to write quarantine access rule")?;
    }

    tokio::fs::create_dir_all(&config.storage.audit_log_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create audit log directory {}",
                config.storage.audit_log_dir.display()
            )
        })?;

    if let Some(cache_dir) = config.moderation.token_cache_path.parent() {
        if !cache_dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(cache_dir)
                .await
                .with_context(|| {
                    format!("Failed to create token cache directory {}", cache_dir.display())
                })?;
        }
    }

    Ok(())
}
