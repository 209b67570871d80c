//! Request-level services behind the HTTP handlers

pub mod delete;
pub mod password;
pub mod upload;

pub use delete::DeleteService;
pub use upload::{stage_upload, UploadOutcome, UploadService};
