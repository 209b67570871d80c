//! Tuku Core Library
//!
//! Domain models, error types, configuration and the moderation seam shared by
//! every tuku crate.

pub mod config;
pub mod error;
pub mod models;
pub mod moderation;

// Re-export commonly used types
pub use config::{Config, DatabaseConfig, ModerationConfig, ServerConfig, StorageConfig, UploadLimits};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use moderation::{ContentCensor, ModerationError, ModerationVerdict, Verdict, VerdictDetail};
