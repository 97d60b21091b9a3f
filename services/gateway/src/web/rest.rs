//! services/gateway/src/web/rest.rs
//!
//! Contains the Axum handlers for the document and query endpoints and the
//! master definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::auth;
use crate::web::protocol::{
    DocumentListResponse, DocumentView, ErrorEnvelope, LoginRequest, LoginResponse, MeResponse,
    MessageResponse, QueryRequest, QueryResponse, StatusResponse, UploadResponse, UserView,
};
use crate::web::state::AppState;
use axum::{
    extract::{multipart::Field, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use file_search_core::Principal;
use std::path::Path as FsPath;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        upload_handler,
        query_handler,
        list_documents_handler,
        delete_document_handler,
        status_handler,
    ),
    components(
        schemas(
            LoginRequest, LoginResponse, UserView, MeResponse, MessageResponse, ErrorEnvelope,
            UploadResponse, QueryRequest, QueryResponse, DocumentView, DocumentListResponse,
            StatusResponse
        )
    ),
    tags(
        (name = "File Search Gateway API", description = "Authenticated access to a remote file-search store.")
    )
)]
pub struct ApiDoc;

/// Name of the multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

//=========================================================================================
// Document Handlers
//=========================================================================================

/// Upload a document into the store (admin only).
///
/// The file is streamed into a staging file under the upload directory, sent
/// to the remote store, and the staging file is removed whatever the outcome.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "The document to upload, in the `file` field."),
    responses(
        (status = 200, description = "Document ingested", body = UploadResponse),
        (status = 400, description = "No file in the request", body = ErrorEnvelope),
        (status = 401, description = "Not logged in", body = ErrorEnvelope),
        (status = 403, description = "Not an administrator", body = ErrorEnvelope),
        (status = 409, description = "A document with this name exists", body = ErrorEnvelope),
        (status = 413, description = "File too large", body = ErrorEnvelope),
        (status = 500, description = "Remote failure", body = ErrorEnvelope)
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let display_name = field
            .file_name()
            .map(base_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::Validation("Uploaded file has no name".to_string()))?;
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let staged = stage_upload(
            &state.config.upload_dir,
            &mut field,
            state.config.max_upload_bytes,
        )
        .await?;

        let result = state
            .catalog
            .upload_file(staged.path(), &display_name, &mime_type)
            .await;
        if let Err(e) = staged.close() {
            warn!("Failed to remove staged upload: {}", e);
        }
        let record = result?;

        info!(
            "'{}' uploaded {} ({} words)",
            principal.username, record.display_name, record.word_count
        );
        return Ok(Json(UploadResponse {
            success: true,
            file_name: display_name,
            message: "File uploaded successfully".to_string(),
        }));
    }

    Err(ApiError::Validation("No file provided".to_string()))
}

/// Streams a multipart field into a new file under `dir`. The file is removed
/// when the returned handle is dropped.
async fn stage_upload(
    dir: &FsPath,
    field: &mut Field<'_>,
    limit: usize,
) -> Result<NamedTempFile, ApiError> {
    let staged = tempfile::Builder::new().prefix("upload-").tempfile_in(dir)?;
    let mut file = tokio::fs::File::from_std(staged.as_file().try_clone()?);

    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len();
        if written > limit {
            return Err(ApiError::PayloadTooLarge(limit));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(staged)
}

/// Strips any client-side directory components from an uploaded file name.
fn base_name(file_name: &str) -> String {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Ask a question answered from the store's documents.
#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Generated answer", body = QueryResponse),
        (status = 400, description = "Question missing or blank", body = ErrorEnvelope),
        (status = 401, description = "Not logged in", body = ErrorEnvelope),
        (status = 500, description = "Remote failure", body = ErrorEnvelope)
    )
)]
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let question = req
        .question
        .ok_or_else(|| ApiError::Validation("Question missing or invalid".to_string()))?;

    let answer = state.query.ask(&question).await?;
    Ok(Json(QueryResponse {
        success: true,
        answer,
    }))
}

/// List every document in the store.
#[utoipa::path(
    get,
    path = "/api/documents",
    responses(
        (status = 200, description = "Documents in the store", body = DocumentListResponse),
        (status = 401, description = "Not logged in", body = ErrorEnvelope),
        (status = 500, description = "Remote failure", body = ErrorEnvelope)
    )
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents: Vec<DocumentView> = state
        .catalog
        .list()
        .await?
        .into_iter()
        .map(DocumentView::from)
        .collect();

    Ok(Json(DocumentListResponse {
        success: true,
        count: documents.len(),
        documents,
    }))
}

/// Delete a document by its display name (admin only).
#[utoipa::path(
    delete,
    path = "/api/documents/{display_name}",
    params(
        ("display_name" = String, Path, description = "Display name of the document, URL-encoded.")
    ),
    responses(
        (status = 200, description = "Document deleted", body = MessageResponse),
        (status = 401, description = "Not logged in", body = ErrorEnvelope),
        (status = 403, description = "Not an administrator", body = ErrorEnvelope),
        (status = 404, description = "No document with this name", body = ErrorEnvelope)
    )
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(display_name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.catalog.delete_by_display_name(&display_name).await? {
        return Err(ApiError::NotFound("not found".to_string()));
    }

    info!("'{}' deleted {}", principal.username, display_name);
    Ok(Json(MessageResponse {
        success: true,
        message: "Document deleted successfully".to_string(),
    }))
}

//=========================================================================================
// Service Handlers
//=========================================================================================

/// Liveness and store binding.
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Gateway status", body = StatusResponse)
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let store = state.store.current();
    Json(StatusResponse {
        success: true,
        status: "online".to_string(),
        store_initialized: store.is_some(),
        store_name: store.map(|s| s.display_name),
    })
}

/// JSON 404 for unknown routes.
pub async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope {
            success: false,
            error: "route not found".to_string(),
        }),
    )
}
