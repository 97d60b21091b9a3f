//! Drives the Gemini adapters against a local mock of the REST API.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use file_search_core::{
    DocumentStatus, DocumentUpload, FileSearchService, OperationPoller, PageCursor, PortError,
    RemoteStoreHandle, RetrievalGenerationService, UploadContent,
};
use gateway_lib::adapters::{GeminiClient, GeminiFileSearchAdapter, GeminiRagAdapter};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const API_KEY: &str = "test-key";
const OPERATION: &str = "fileSearchStores/s1/upload/operations/op1";
const DOCUMENT: &str = "fileSearchStores/s1/documents/d1";

#[derive(Default)]
struct Recorded {
    requests: Vec<String>,
    api_keys: Vec<String>,
    upload_headers: Vec<(String, String)>,
    upload_metadata: Option<Value>,
    uploaded: Vec<u8>,
    uploaded_length: Option<String>,
    operation_polls: usize,
    generate_body: Option<Value>,
}

struct Mock {
    base_url: String,
    recorded: Mutex<Recorded>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message, "status": "ERR" } })),
    )
        .into_response()
}

fn upload_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-goog-upload"))
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect()
}

async fn handle(
    State(mock): State<Arc<Mock>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let query = uri.query().unwrap_or_default().to_string();
    {
        let mut recorded = mock.recorded.lock().unwrap();
        recorded.requests.push(format!("{} {}?{}", method, path, query));
        if let Some(key) = headers.get("x-goog-api-key") {
            recorded.api_keys.push(key.to_str().unwrap().to_string());
        }
    }

    match (method, path.as_str()) {
        (Method::GET, "/v1beta/fileSearchStores") => {
            if query.contains("pageToken=p2") {
                Json(json!({
                    "fileSearchStores": [{ "name": "fileSearchStores/s2", "displayName": "second" }],
                    "nextPageToken": ""
                }))
                .into_response()
            } else {
                Json(json!({
                    "fileSearchStores": [{ "name": "fileSearchStores/s1", "displayName": "first" }],
                    "nextPageToken": "p2"
                }))
                .into_response()
            }
        }
        (Method::POST, "/v1beta/fileSearchStores") => {
            let request: Value = serde_json::from_slice(&body).unwrap();
            Json(json!({ "name": "fileSearchStores/created", "displayName": request["displayName"] }))
                .into_response()
        }
        (Method::GET, "/v1beta/fileSearchStores/s1/documents") => Json(json!({
            "documents": [
                {
                    "name": DOCUMENT,
                    "displayName": "notes.txt",
                    "state": "STATE_ACTIVE",
                    "customMetadata": [{ "key": "word_count", "numericValue": 3 }]
                },
                { "name": "fileSearchStores/s1/documents/d2", "displayName": "scan.pdf", "state": "STATE_PENDING" }
            ]
        }))
        .into_response(),
        (Method::GET, "/v1beta/fileSearchStores/missing/documents") => {
            error(StatusCode::NOT_FOUND, "Store not found")
        }
        (Method::GET, "/v1beta/fileSearchStores/broken/documents") => {
            error(StatusCode::INTERNAL_SERVER_ERROR, "Backend exploded")
        }
        (Method::POST, "/upload/v1beta/fileSearchStores/s1:uploadToFileSearchStore") => {
            let mut recorded = mock.recorded.lock().unwrap();
            recorded.upload_headers.extend(upload_headers(&headers));
            recorded.upload_metadata = serde_json::from_slice(&body).ok();
            let session = format!("{}/upload-session/1", mock.base_url);
            ([("x-goog-upload-url", session)], Json(json!({}))).into_response()
        }
        (Method::POST, "/upload-session/1") => {
            let mut recorded = mock.recorded.lock().unwrap();
            recorded.upload_headers.extend(upload_headers(&headers));
            recorded.uploaded = body.to_vec();
            recorded.uploaded_length = headers
                .get("content-length")
                .map(|v| v.to_str().unwrap().to_string());
            Json(json!({ "name": OPERATION, "done": false })).into_response()
        }
        (Method::GET, p) if p == format!("/v1beta/{}", OPERATION) => {
            let mut recorded = mock.recorded.lock().unwrap();
            recorded.operation_polls += 1;
            if recorded.operation_polls < 2 {
                Json(json!({ "name": OPERATION })).into_response()
            } else {
                Json(json!({
                    "name": OPERATION,
                    "done": true,
                    "response": { "documentName": DOCUMENT }
                }))
                .into_response()
            }
        }
        (Method::GET, p) if p == format!("/v1beta/{}", DOCUMENT) => Json(json!({
            "name": DOCUMENT,
            "displayName": "notes.txt",
            "state": "STATE_ACTIVE",
            "customMetadata": [{ "key": "word_count", "numericValue": 3 }]
        }))
        .into_response(),
        (Method::DELETE, p) if p == format!("/v1beta/{}", DOCUMENT) => Json(json!({})).into_response(),
        (Method::POST, "/v1beta/models/gemini-test:generateContent") => {
            mock.recorded.lock().unwrap().generate_body = serde_json::from_slice(&body).ok();
            Json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Forty" }, { "text": "-two." }] }
                }]
            }))
            .into_response()
        }
        _ => error(StatusCode::NOT_FOUND, "no such mock route"),
    }
}

async fn start_mock() -> Arc<Mock> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mock = Arc::new(Mock {
        base_url: format!("http://{}", listener.local_addr().unwrap()),
        recorded: Mutex::new(Recorded::default()),
    });
    let app = Router::new().fallback(handle).with_state(mock.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    mock
}

fn client(base_url: &str) -> GeminiClient {
    GeminiClient::new(base_url, API_KEY, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn store_listing_follows_page_tokens() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));

    let first = adapter.list_stores(10, None).await.unwrap();
    assert_eq!(first.items[0].id, "fileSearchStores/s1");
    assert_eq!(first.next_cursor, Some(PageCursor::new("p2")));
    let second = adapter.list_stores(10, first.next_cursor).await.unwrap();
    assert_eq!(second.items[0].display_name, "second");
    assert_eq!(second.next_cursor, None);

    let recorded = mock.recorded.lock().unwrap();
    assert!(recorded.requests[0].contains("pageSize=10"));
    assert!(recorded.api_keys.iter().all(|k| k == API_KEY));
    assert_eq!(recorded.api_keys.len(), 2);
}

#[tokio::test]
async fn store_handle_finds_a_store_on_a_later_page() {
    let mock = start_mock().await;
    let handle = RemoteStoreHandle::new(Arc::new(GeminiFileSearchAdapter::new(client(
        &mock.base_url,
    ))));

    let store = handle.acquire("second").await.unwrap();
    assert_eq!(store.id, "fileSearchStores/s2");

    let recorded = mock.recorded.lock().unwrap();
    assert!(recorded.requests.iter().all(|r| r.starts_with("GET")));
}

#[tokio::test]
async fn missing_store_is_created() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));

    let store = adapter.create_store("fresh").await.unwrap();
    assert_eq!(store.id, "fileSearchStores/created");
    assert_eq!(store.display_name, "fresh");
}

#[tokio::test]
async fn documents_are_mapped_from_remote_metadata() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));

    let page = adapter
        .list_documents("fileSearchStores/s1", 20, None)
        .await
        .unwrap();
    assert_eq!(page.next_cursor, None);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].word_count, 3);
    assert_eq!(page.items[0].status, DocumentStatus::Ready);
    assert_eq!(page.items[1].word_count, 0);
    assert_eq!(page.items[1].status, DocumentStatus::Processing);
}

#[tokio::test]
async fn upload_uses_the_resumable_protocol_and_resolves_the_document() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));

    let operation = adapter
        .upload_document(
            "fileSearchStores/s1",
            DocumentUpload {
                display_name: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                content: Bytes::from_static(b"one two three").into(),
                word_count: Some(3),
            },
        )
        .await
        .unwrap();
    assert!(!operation.done);
    assert_eq!(operation.name, OPERATION);

    let record = OperationPoller::new(Duration::from_millis(5), 10)
        .await_completion(&adapter, operation)
        .await
        .unwrap();
    assert_eq!(record.remote_id, DOCUMENT);
    assert_eq!(record.display_name, "notes.txt");
    assert_eq!(record.word_count, 3);
    assert_eq!(record.status, DocumentStatus::Ready);

    let recorded = mock.recorded.lock().unwrap();
    assert_eq!(recorded.uploaded, b"one two three");
    assert_eq!(recorded.operation_polls, 2);
    assert_eq!(
        recorded.upload_metadata,
        Some(json!({
            "displayName": "notes.txt",
            "mimeType": "text/plain",
            "customMetadata": [{ "key": "word_count", "numericValue": 3.0 }]
        }))
    );
    let header = |name: &str| -> Vec<&str> {
        recorded
            .upload_headers
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    };
    assert_eq!(header("x-goog-upload-protocol"), vec!["resumable"]);
    assert_eq!(header("x-goog-upload-command"), vec!["start", "upload, finalize"]);
    assert_eq!(header("x-goog-upload-header-content-length"), vec!["13"]);
    assert_eq!(header("x-goog-upload-offset"), vec!["0"]);
}

#[tokio::test]
async fn staged_file_upload_streams_its_contents() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));
    let staged = tempfile::NamedTempFile::new().unwrap();
    let contents = "lorem ipsum ".repeat(20_000);
    std::fs::write(staged.path(), &contents).unwrap();

    let operation = adapter
        .upload_document(
            "fileSearchStores/s1",
            DocumentUpload {
                display_name: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                content: UploadContent::File {
                    path: staged.path().to_path_buf(),
                    len: contents.len() as u64,
                },
                word_count: Some(40_000),
            },
        )
        .await
        .unwrap();
    assert_eq!(operation.name, OPERATION);

    let recorded = mock.recorded.lock().unwrap();
    assert_eq!(recorded.uploaded, contents.as_bytes());
    assert_eq!(recorded.uploaded_length, Some(contents.len().to_string()));
    assert!(recorded
        .upload_headers
        .contains(&("x-goog-upload-header-content-length".to_string(), contents.len().to_string())));
}

#[tokio::test]
async fn missing_staged_file_is_reported_before_sending() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));
    let dir = tempfile::tempdir().unwrap();

    let err = adapter
        .upload_document(
            "fileSearchStores/s1",
            DocumentUpload {
                display_name: "gone.txt".to_string(),
                mime_type: "text/plain".to_string(),
                content: UploadContent::File {
                    path: dir.path().join("gone.txt"),
                    len: 10,
                },
                word_count: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Unexpected(_)));
    assert!(mock.recorded.lock().unwrap().uploaded.is_empty());
}

#[tokio::test]
async fn delete_document_forces_removal() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));

    adapter.delete_document(DOCUMENT, true).await.unwrap();
    let recorded = mock.recorded.lock().unwrap();
    assert_eq!(
        recorded.requests.last().unwrap(),
        &format!("DELETE /v1beta/{}?force=true", DOCUMENT)
    );
}

#[tokio::test]
async fn remote_errors_are_mapped() {
    let mock = start_mock().await;
    let adapter = GeminiFileSearchAdapter::new(client(&mock.base_url));

    let err = adapter
        .list_documents("fileSearchStores/missing", 20, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(m) if m == "Store not found"));

    let err = adapter
        .list_documents("fileSearchStores/broken", 20, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::RemoteOperationFailed(m) if m == "Backend exploded"));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let adapter = GeminiFileSearchAdapter::new(client(&base_url));
    let err = adapter.list_stores(10, None).await.unwrap_err();
    assert!(matches!(err, PortError::Transport(_)));
}

#[tokio::test]
async fn generation_binds_the_store_and_joins_parts() {
    let mock = start_mock().await;
    let generator = GeminiRagAdapter::new(client(&mock.base_url), "gemini-test".to_string());

    let answer = generator
        .generate("fileSearchStores/s1", "What is the answer?")
        .await
        .unwrap();
    assert_eq!(answer, "Forty-two.");

    let recorded = mock.recorded.lock().unwrap();
    let body = recorded.generate_body.as_ref().unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "What is the answer?");
    assert_eq!(
        body["tools"][0]["fileSearch"]["fileSearchStoreNames"],
        json!(["fileSearchStores/s1"])
    );
}
