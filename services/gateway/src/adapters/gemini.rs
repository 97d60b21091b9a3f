//! services/gateway/src/adapters/gemini.rs
//!
//! REST adapter for the Gemini file-search API. It implements the
//! `FileSearchService` port from the `file_search_core` crate and owns the
//! shared HTTP client used by the generation adapter.

use async_trait::async_trait;
use file_search_core::{
    DocumentRecord, DocumentStatus, DocumentUpload, FileSearchService, LongRunningOperation,
    OperationError, Page, PageCursor, PortError, PortResult, RemoteStore, UploadContent,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const WORD_COUNT_KEY: &str = "word_count";

//=========================================================================================
// Shared Client
//=========================================================================================

/// An authenticated HTTP client bound to one API base URL.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> PortResult<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| PortError::Validation(format!("Invalid API key format: {}", e)))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of a `v1beta` resource, e.g. `fileSearchStores/abc`.
    pub(crate) fn api_url(&self, resource: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, resource)
    }

    fn upload_url(&self, resource: &str) -> String {
        format!("{}/upload/v1beta/{}", self.base_url, resource)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Sends a request and decodes a successful JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = send(request).await?;
        response.json::<T>().await.map_err(transport_error)
    }
}

/// Sends a request, turning non-success statuses into `PortError`s.
async fn send(request: RequestBuilder) -> PortResult<Response> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body.trim()));

    Err(match status {
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        _ => PortError::RemoteOperationFailed(message),
    })
}

pub(crate) fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout(e.to_string())
    } else if e.is_decode() {
        PortError::Unexpected(format!("Malformed response from the remote service: {}", e))
    } else {
        PortError::Transport(e.to_string())
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateStoreRequest<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreWire {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListStoresResponse {
    #[serde(default)]
    file_search_stores: Vec<StoreWire>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataWire {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    numeric_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentWire {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    custom_metadata: Vec<MetadataWire>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<DocumentWire>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    display_name: &'a str,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    custom_metadata: Vec<MetadataWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationWire {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<StatusWire>,
    #[serde(default)]
    response: Option<UploadResultWire>,
}

#[derive(Debug, Deserialize)]
struct StatusWire {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResultWire {
    #[serde(default)]
    document_name: Option<String>,
}

//=========================================================================================
// Mapping
//=========================================================================================

fn next_cursor(token: Option<String>) -> Option<PageCursor> {
    token.filter(|t| !t.is_empty()).map(PageCursor::new)
}

fn map_state(state: Option<&str>) -> DocumentStatus {
    match state {
        Some("STATE_PENDING") => DocumentStatus::Processing,
        Some("STATE_ACTIVE") => DocumentStatus::Ready,
        Some("STATE_FAILED") => DocumentStatus::Failed,
        _ => DocumentStatus::Unknown,
    }
}

impl From<StoreWire> for RemoteStore {
    fn from(wire: StoreWire) -> Self {
        Self {
            display_name: wire.display_name.unwrap_or_default(),
            id: wire.name,
        }
    }
}

impl From<DocumentWire> for DocumentRecord {
    fn from(wire: DocumentWire) -> Self {
        let word_count = wire
            .custom_metadata
            .iter()
            .find(|m| m.key == WORD_COUNT_KEY)
            .and_then(|m| m.numeric_value)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64)
            .unwrap_or(0);

        Self {
            status: map_state(wire.state.as_deref()),
            display_name: wire.display_name.unwrap_or_default(),
            remote_id: wire.name,
            word_count,
        }
    }
}

//=========================================================================================
// FileSearchService Adapter
//=========================================================================================

pub struct GeminiFileSearchAdapter {
    client: GeminiClient,
}

impl GeminiFileSearchAdapter {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    async fn get_document(&self, document_id: &str) -> PortResult<DocumentRecord> {
        let request = self.client.http().get(self.client.api_url(document_id));
        let document: DocumentWire = self.client.send_json(request).await?;
        Ok(document.into())
    }

    /// Maps a raw operation. A finished, successful upload is resolved to the
    /// document it created.
    async fn resolve_operation(
        &self,
        wire: OperationWire,
        display_name: &str,
    ) -> PortResult<LongRunningOperation> {
        let mut operation = LongRunningOperation {
            name: wire.name,
            display_name: display_name.to_string(),
            done: wire.done,
            result: None,
            error: wire.error.map(|e| OperationError {
                code: e.code,
                message: e.message,
            }),
        };

        if operation.done && operation.error.is_none() {
            let document_name = wire
                .response
                .and_then(|r| r.document_name)
                .filter(|n| !n.is_empty());
            operation.result = Some(match document_name {
                Some(name) => self.get_document(&name).await?,
                None => DocumentRecord {
                    remote_id: String::new(),
                    display_name: display_name.to_string(),
                    word_count: 0,
                    status: DocumentStatus::Unknown,
                },
            });
        }
        Ok(operation)
    }
}

fn page_query(page_size: u32, cursor: &Option<PageCursor>) -> Vec<(&'static str, String)> {
    let mut query = vec![("pageSize", page_size.to_string())];
    if let Some(cursor) = cursor {
        query.push(("pageToken", cursor.as_str().to_string()));
    }
    query
}

#[async_trait]
impl FileSearchService for GeminiFileSearchAdapter {
    async fn list_stores(
        &self,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> PortResult<Page<RemoteStore>> {
        let request = self
            .client
            .http()
            .get(self.client.api_url("fileSearchStores"))
            .query(&page_query(page_size, &cursor));
        let page: ListStoresResponse = self.client.send_json(request).await?;
        debug!(stores = page.file_search_stores.len(), "Fetched store page");

        Ok(Page {
            items: page.file_search_stores.into_iter().map(RemoteStore::from).collect(),
            next_cursor: next_cursor(page.next_page_token),
        })
    }

    async fn create_store(&self, display_name: &str) -> PortResult<RemoteStore> {
        let request = self
            .client
            .http()
            .post(self.client.api_url("fileSearchStores"))
            .json(&CreateStoreRequest { display_name });
        let store: StoreWire = self.client.send_json(request).await?;
        info!("Created remote store {}", store.name);
        Ok(store.into())
    }

    async fn delete_store(&self, store_id: &str, force: bool) -> PortResult<()> {
        let request = self
            .client
            .http()
            .delete(self.client.api_url(store_id))
            .query(&[("force", force)]);
        send(request).await?;
        Ok(())
    }

    async fn list_documents(
        &self,
        store_id: &str,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> PortResult<Page<DocumentRecord>> {
        let request = self
            .client
            .http()
            .get(self.client.api_url(&format!("{}/documents", store_id)))
            .query(&page_query(page_size, &cursor));
        let page: ListDocumentsResponse = self.client.send_json(request).await?;
        debug!(store = store_id, documents = page.documents.len(), "Fetched document page");

        Ok(Page {
            items: page.documents.into_iter().map(DocumentRecord::from).collect(),
            next_cursor: next_cursor(page.next_page_token),
        })
    }

    async fn upload_document(
        &self,
        store_id: &str,
        upload: DocumentUpload,
    ) -> PortResult<LongRunningOperation> {
        let custom_metadata = upload
            .word_count
            .map(|n| MetadataWire {
                key: WORD_COUNT_KEY.to_string(),
                numeric_value: Some(n as f64),
                string_value: None,
            })
            .into_iter()
            .collect();
        let metadata = UploadMetadata {
            display_name: &upload.display_name,
            mime_type: &upload.mime_type,
            custom_metadata,
        };
        let content_length = upload.content.len();

        // --- 1. Start a resumable upload session ---
        let start = self
            .client
            .http()
            .post(self.client.upload_url(&format!("{}:uploadToFileSearchStore", store_id)))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", content_length)
            .header("X-Goog-Upload-Header-Content-Type", upload.mime_type.as_str())
            .json(&metadata);
        let response = send(start).await?;
        let session_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PortError::RemoteOperationFailed("upload session returned no upload URL".to_string())
            })?;

        // --- 2. Send the bytes and finalize ---
        let body = match upload.content {
            UploadContent::Bytes(bytes) => Body::from(bytes),
            UploadContent::File { path, .. } => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    PortError::Unexpected(format!(
                        "Failed to open staged upload {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Body::wrap_stream(tokio_util::io::ReaderStream::new(file))
            }
        };
        let finalize = self
            .client
            .http()
            .post(session_url)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", 0)
            .header(CONTENT_TYPE, upload.mime_type.as_str())
            .header(CONTENT_LENGTH, content_length)
            .body(body);
        let operation: OperationWire = self.client.send_json(finalize).await?;
        debug!(operation = %operation.name, done = operation.done, "Upload submitted");

        self.resolve_operation(operation, &upload.display_name).await
    }

    async fn get_operation(
        &self,
        operation: &LongRunningOperation,
    ) -> PortResult<LongRunningOperation> {
        let request = self.client.http().get(self.client.api_url(&operation.name));
        let wire: OperationWire = self.client.send_json(request).await?;
        self.resolve_operation(wire, &operation.display_name).await
    }

    async fn delete_document(&self, document_id: &str, force: bool) -> PortResult<()> {
        let request = self
            .client
            .http()
            .delete(self.client.api_url(document_id))
            .query(&[("force", force)]);
        send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_document_state_and_metadata() {
        let wire: DocumentWire = serde_json::from_value(serde_json::json!({
            "name": "fileSearchStores/s/documents/d",
            "displayName": "notes.txt",
            "state": "STATE_PENDING",
            "customMetadata": [
                { "key": "author", "stringValue": "ann" },
                { "key": "word_count", "numericValue": 42 }
            ]
        }))
        .unwrap();

        let record = DocumentRecord::from(wire);
        assert_eq!(record.remote_id, "fileSearchStores/s/documents/d");
        assert_eq!(record.display_name, "notes.txt");
        assert_eq!(record.word_count, 42);
        assert_eq!(record.status, DocumentStatus::Processing);
    }

    #[test]
    fn missing_metadata_defaults() {
        let wire: DocumentWire =
            serde_json::from_value(serde_json::json!({ "name": "fileSearchStores/s/documents/d" }))
                .unwrap();
        let record = DocumentRecord::from(wire);
        assert_eq!(record.word_count, 0);
        assert_eq!(record.status, DocumentStatus::Unknown);
        assert_eq!(map_state(Some("STATE_ACTIVE")), DocumentStatus::Ready);
        assert_eq!(map_state(Some("STATE_FAILED")), DocumentStatus::Failed);
        assert_eq!(map_state(Some("STATE_UNSPECIFIED")), DocumentStatus::Unknown);
    }

    #[test]
    fn empty_page_token_ends_enumeration() {
        assert_eq!(next_cursor(None), None);
        assert_eq!(next_cursor(Some(String::new())), None);
        assert_eq!(next_cursor(Some("p2".into())), Some(PageCursor::new("p2")));
    }

    #[test]
    fn upload_metadata_shape() {
        let metadata = UploadMetadata {
            display_name: "a.txt",
            mime_type: "text/plain",
            custom_metadata: vec![MetadataWire {
                key: WORD_COUNT_KEY.to_string(),
                numeric_value: Some(3.0),
                string_value: None,
            }],
        };
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            serde_json::json!({
                "displayName": "a.txt",
                "mimeType": "text/plain",
                "customMetadata": [{ "key": "word_count", "numericValue": 3.0 }]
            })
        );
    }
}
