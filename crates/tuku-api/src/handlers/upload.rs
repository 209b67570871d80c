use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use bytes::Bytes;
use tuku_core::models::{UploadStatus, UploadedFile};

use crate::error::{ApiResponse, HttpAppError};
use crate::services::{stage_upload, UploadService};
use crate::state::AppState;

const IMAGE_FIELD: &str = "image";
const PASSWORD_FIELD: &str = "delete_password";

struct UploadForm {
    file: UploadedFile,
    delete_password: Option<String>,
}

fn transport_status(err: &MultipartError) -> UploadStatus {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadStatus::ExceedsLimit
    } else {
        UploadStatus::Partial
    }
}

/// Read the whole form, then stage the image. Nothing touches the store when the
/// body is broken.
async fn read_upload_form(state: &AppState, mut multipart: Multipart) -> UploadForm {
    let mut image: Option<(Bytes, String, Option<String>)> = None;
    let mut delete_password = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read multipart body");
                let name = image.map(|(_, name, _)| name).unwrap_or_default();
                return UploadForm {
                    file: UploadedFile::failed(name, transport_status(&e)),
                    delete_password,
                };
            }
        };

        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(IMAGE_FIELD) if image.is_none() => {
                let name = field.file_name().unwrap_or("unknown").to_string();
                let content_type = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(data) => image = Some((data, name, content_type)),
                    Err(e) => {
                        tracing::debug!(error = %e, "Image field ended early");
                        return UploadForm {
                            file: UploadedFile::failed(name, transport_status(&e)),
                            delete_password,
                        };
                    }
                }
            }
            Some(PASSWORD_FIELD) => match field.text().await {
                Ok(text) => delete_password = Some(text),
                Err(e) => {
                    tracing::debug!(error = %e, "Password field ended early");
                    let name = image.map(|(_, name, _)| name).unwrap_or_default();
                    return UploadForm {
                        file: UploadedFile::failed(name, transport_status(&e)),
                        delete_password: None,
                    };
                }
            },
            _ => {}
        }
    }

    let file = match image {
        Some((data, name, content_type)) => {
            stage_upload(state.store.as_ref(), data, name, content_type).await
        }
        None => UploadedFile::failed(String::new(), UploadStatus::NoFile),
    };

    UploadForm {
        file,
        delete_password,
    }
}

/// Upload an image
///
/// Accepted images are stored publicly; images the moderator flags are moved to
/// quarantine and reported as a 400.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data",
        description = "Fields: `image` (file) and `delete_password` (at least 6 characters)"),
    responses(
        (status = 200, description = "Image stored; data has url and filename", body = ApiResponse),
        (status = 400, description = "Rejected by validation or moderation", body = ApiResponse),
        (status = 500, description = "Infrastructure failure", body = ApiResponse)
    )
)]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<ApiResponse, HttpAppError> {
    let form = read_upload_form(&state, multipart).await;
    let outcome = UploadService::new(&state)
        .process(form.file, form.delete_password.as_deref())
        .await?;
    Ok(outcome.into_response())
}
