//! HTTP response envelope and error conversion
//!
//! Every endpoint answers with `{code, message, data?}` where `code` mirrors the HTTP
//! status. Handlers return `Result<ApiResponse, HttpAppError>`; anything convertible
//! into [`AppError`] renders through the same envelope.

use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tuku_core::{AppError, ErrorMetadata, LogLevel};
use utoipa::ToSchema;

/// Response body shared by all JSON endpoints
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiResponse {
    /// Mirrors the HTTP status code
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data,
        }
    }

    /// 400 response for a request the client can fix
    pub fn rejected(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code: 400,
            message: message.into(),
            data,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: both the trait and AppError live in other crates)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<FormRejection> for HttpAppError {
    fn from(rejection: FormRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| env.eq_ignore_ascii_case("production") || env.eq_ignore_ascii_case("prod"))
        .unwrap_or(false)
}

impl HttpAppError {
    fn envelope(&self, is_production: bool) -> ApiResponse {
        let app_error = &self.0;
        let mut data = json!({
            "error": app_error.error_code(),
            "retryable": app_error.is_recoverable(),
        });
        if let Some(action) = app_error.suggested_action() {
            data["suggested_action"] = json!(action);
        }
        // Details stay in the operational log for sensitive errors and in production.
        if !is_production && !app_error.is_sensitive() {
            data["details"] = json!(app_error.detailed_message());
        }

        ApiResponse {
            code: app_error.http_status_code(),
            message: app_error.client_message(),
            data: Some(data),
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        log_error(&self.0);
        self.envelope(is_production_env()).into_response()
    }
}
