//! Shared application state

use std::sync::Arc;

use tuku_core::Config;
use tuku_db::ImageRepository;
use tuku_processing::ImageValidator;
use tuku_services::QuarantineLogger;
use tuku_storage::BlobStore;

/// Everything a request needs. Built once at startup and shared behind an `Arc`.
pub struct AppState {
    pub config: Config,
    pub images: Arc<dyn ImageRepository>,
    pub store: Arc<dyn BlobStore>,
    pub validator: ImageValidator,
    pub quarantine: QuarantineLogger,
}

impl AppState {
    /// Prefix for public image URLs
    pub fn public_base_url(&self) -> &str {
        &self.config.server.public_base_url
    }
}
