//! Tuku Services Library
//!
//! Outbound moderation (token cache + censorship client) and quarantine handling
//! for rejected uploads.

pub mod moderation;
pub mod quarantine;

pub use moderation::{ModerationClient, TokenCache};
pub use quarantine::{QuarantineError, QuarantineLogger, QuarantinedFile, Severity};
