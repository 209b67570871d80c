use std::sync::Arc;

use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{ApiResponse, HttpAppError};
use crate::services::DeleteService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteRequest {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub password: String,
}

/// Accepts a JSON body, falling back to a urlencoded form.
async fn read_delete_request(req: Request) -> Result<DeleteRequest, HttpAppError> {
    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        let Json(body) = Json::<DeleteRequest>::from_request(req, &()).await?;
        Ok(body)
    } else {
        let Form(body) = Form::<DeleteRequest>::from_request(req, &()).await?;
        Ok(body)
    }
}

/// Delete an image with its delete password
#[utoipa::path(
    post,
    path = "/api/delete",
    tag = "images",
    request_body(content = DeleteRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Image deleted", body = ApiResponse),
        (status = 400, description = "Missing parameters, unknown image or wrong password", body = ApiResponse),
        (status = 500, description = "The file could not be removed; nothing was deleted", body = ApiResponse)
    )
)]
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<ApiResponse, HttpAppError> {
    let body = read_delete_request(req).await?;
    DeleteService::new(&state)
        .delete(&body.filename, &body.password)
        .await?;
    Ok(ApiResponse::ok("Deleted", None))
}
