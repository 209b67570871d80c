//! Tuku API Library
//!
//! HTTP handlers, the upload and delete services behind them, and application setup.

mod api_doc;
pub mod error;
mod handlers;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ApiResponse, HttpAppError};
pub use state::AppState;
