//! Route configuration

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tuku_storage::keys;

use crate::api_doc::openapi_json;
use crate::handlers::{
    delete::delete_image,
    gallery::{list_images, view_image},
    health::health_check,
    upload::upload_image,
};
use crate::state::AppState;

/// Room for multipart framing and the password field on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    let body_limit = state.config.limits.max_file_size_bytes + MULTIPART_OVERHEAD_BYTES;
    // Only the public area is served. Quarantine is never routed.
    let uploads_dir = state.config.storage.root.join(keys::UPLOADS_AREA);

    let concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1024)
        .max(1);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/upload", post(upload_image))
        .route("/api/delete", post(delete_image))
        .route("/api/images", get(list_images))
        .route("/view/{id}", get(view_image))
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
