//! OpenAPI documentation

use axum::Json;
use utoipa::OpenApi;

use crate::error::ApiResponse;
use crate::handlers;
use tuku_core::models::{GalleryDay, ImageResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tuku API",
        version = "0.1.0",
        description = "Image hosting with content moderation. Every JSON response uses the `{code, message, data?}` envelope and `code` equals the HTTP status."
    ),
    paths(
        handlers::upload::upload_image,
        handlers::delete::delete_image,
        handlers::gallery::list_images,
        handlers::gallery::view_image,
        handlers::health::health_check,
    ),
    components(schemas(
        ApiResponse,
        GalleryDay,
        ImageResponse,
        handlers::delete::DeleteRequest,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "images", description = "Upload and deletion"),
        (name = "gallery", description = "Browsing stored images"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
