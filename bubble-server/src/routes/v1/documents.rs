//! Document upload.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Extension, Json, Router};
use bubble_core::auth::Identity;
use bytes::Bytes;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::documents::UploadResponse;
use crate::state::AppState;

const DEFAULT_FILE_NAME: &str = "document.pdf";

#[derive(OpenApi)]
#[openapi(paths(upload_document), components(schemas(UploadResponse)))]
pub struct DocumentsApi;

pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().route(
        "/documents",
        post(upload_document).layer(DefaultBodyLimit::max(max_upload_bytes)),
    )
}

/// Upload a PDF for retrieval-augmented chat.
///
/// The returned `pdfId` is the namespace to pass with later messages. Uploading
/// the same bytes again returns the same id with `alreadyIndexed: true` and
/// does not re-index.
#[utoipa::path(
    post,
    path = "/v1/documents",
    tag = "documents",
    request_body(content_type = "multipart/form-data", description = "Form with a `file` part"),
    responses(
        (status = 200, description = "Document indexed or already known", body = UploadResponse),
        (status = 400, description = "Missing or empty `file` part"),
        (status = 502, description = "Ingestion webhook failed"),
        (status = 503, description = "No ingestion webhook configured"),
    )
)]
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let ingestor = state
        .ingestor
        .as_ref()
        .ok_or_else(|| ServerError::Unavailable("document ingestion is not configured".into()))?;

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ServerError::BadRequest("missing `file` part".into()))?;
    info!(user_id = %identity.user_id, file_name = %file_name, size = bytes.len(), "document upload");

    let outcome = ingestor.ingest(&file_name, bytes).await?;
    Ok(Json(outcome.into()))
}
