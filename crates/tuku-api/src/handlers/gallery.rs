use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use serde::Deserialize;
use serde_json::json;
use tuku_core::models::{group_by_day, public_url};
use tuku_core::AppError;
use utoipa::IntoParams;

use crate::error::{ApiResponse, HttpAppError};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 200;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize, IntoParams)]
pub struct GalleryQuery {
    /// Maximum number of images (default 200, max 1000)
    pub limit: Option<i64>,
}

/// List images grouped by upload day, newest first
#[utoipa::path(
    get,
    path = "/api/images",
    tag = "gallery",
    params(GalleryQuery),
    responses(
        (status = 200, description = "data is a list of GalleryDay", body = ApiResponse)
    )
)]
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GalleryQuery>,
) -> Result<ApiResponse, HttpAppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = state.images.list_recent(limit).await?;
    let days = group_by_day(records, state.public_base_url());
    Ok(ApiResponse::ok("OK", Some(json!(days))))
}

/// Count a view and redirect to the image file
#[utoipa::path(
    get,
    path = "/view/{id}",
    tag = "gallery",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 303, description = "Redirect to the public image URL"),
        (status = 404, description = "Unknown image", body = ApiResponse)
    )
)]
pub async fn view_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Redirect, HttpAppError> {
    let record = state
        .images
        .record_view(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    tracing::debug!(id, views = record.views, "Image viewed");
    Ok(Redirect::to(&public_url(
        state.public_base_url(),
        &record.file_path,
    )))
}
