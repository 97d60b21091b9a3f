//! services/gateway/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the gateway.
//! Field names are camelCase on the wire.

use file_search_core::{DocumentRecord, Principal};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: Option<String>,
}

//=========================================================================================
// Responses
//=========================================================================================

/// Body of every failed request.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserView {
    pub username: String,
    /// `admin` or `member`.
    pub role: String,
}

impl From<&Principal> for UserView {
    fn from(principal: &Principal) -> Self {
        Self {
            username: principal.username.clone(),
            role: principal.role.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserView,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub authenticated: bool,
    pub user: Option<UserView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_name: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct QueryResponse {
    pub success: bool,
    pub answer: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub display_name: String,
    pub word_count: u64,
    /// One of `processing`, `ready`, `failed`, `unknown`.
    pub status: String,
}

impl From<DocumentRecord> for DocumentView {
    fn from(record: DocumentRecord) -> Self {
        Self {
            display_name: record.display_name,
            word_count: record.word_count,
            status: record.status.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub success: bool,
    pub documents: Vec<DocumentView>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub status: String,
    pub store_initialized: bool,
    pub store_name: Option<String>,
}
