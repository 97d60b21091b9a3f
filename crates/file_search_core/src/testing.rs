//! crates/file_search_core/src/testing.rs
//!
//! In-memory implementations of the ports, for tests in this crate and in the
//! gateway service (`testing` feature).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::access::hash_password;
use crate::domain::{
    DocumentRecord, DocumentStatus, DocumentUpload, LongRunningOperation, OperationError, Page,
    PageCursor, RemoteStore, Role, StoredCredentials,
};
use crate::ports::{
    CredentialStore, FileSearchService, PortError, PortResult, RetrievalGenerationService,
};

//=========================================================================================
// Remote Store
//=========================================================================================

#[derive(Default)]
struct Calls {
    list_stores: usize,
    create_store: usize,
    list_documents: usize,
    upload: usize,
    get_operation: usize,
}

struct PendingIngest {
    store_id: String,
    record: DocumentRecord,
    remaining_polls: u32,
}

#[derive(Default)]
struct State {
    next_id: u64,
    stores: Vec<RemoteStore>,
    documents: HashMap<String, Vec<DocumentRecord>>,
    pending: HashMap<String, PendingIngest>,
    finished: HashMap<String, LongRunningOperation>,
    deleted_documents: Vec<String>,
    calls: Calls,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A remote file-search service held in memory.
///
/// Catalogs are paged by offset; uploads finish after `poll_rounds`
/// `get_operation` calls.
pub struct InMemoryFileSearch {
    state: Mutex<State>,
    poll_rounds: u32,
    ingest_status: DocumentStatus,
    ingest_failure: Option<String>,
    offline: AtomicBool,
}

impl Default for InMemoryFileSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFileSearch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            poll_rounds: 1,
            ingest_status: DocumentStatus::Ready,
            ingest_failure: None,
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_poll_rounds(mut self, rounds: u32) -> Self {
        self.poll_rounds = rounds;
        self
    }

    /// Status reported for documents once ingestion finishes.
    pub fn with_ingest_status(mut self, status: DocumentStatus) -> Self {
        self.ingest_status = status;
        self
    }

    /// Every ingestion finishes with this error instead of a document.
    pub fn with_ingest_failure(mut self, message: &str) -> Self {
        self.ingest_failure = Some(message.to_string());
        self
    }

    /// While offline every call fails with `PortError::Transport`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn seed_store(&self, display_name: &str) -> RemoteStore {
        let mut state = self.state.lock();
        let id = state.next_id();
        let store = RemoteStore {
            id: format!("fileSearchStores/store-{}", id),
            display_name: display_name.to_string(),
        };
        state.stores.push(store.clone());
        store
    }

    pub fn seed_document(
        &self,
        store_id: &str,
        display_name: &str,
        status: DocumentStatus,
        word_count: u64,
    ) -> DocumentRecord {
        let mut state = self.state.lock();
        let id = state.next_id();
        let record = DocumentRecord {
            remote_id: format!("{}/documents/doc-{}", store_id, id),
            display_name: display_name.to_string(),
            word_count,
            status,
        };
        state
            .documents
            .entry(store_id.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    pub fn stores(&self) -> Vec<RemoteStore> {
        self.state.lock().stores.clone()
    }

    pub fn documents(&self, store_id: &str) -> Vec<DocumentRecord> {
        self.state
            .lock()
            .documents
            .get(store_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn deleted_documents(&self) -> Vec<String> {
        self.state.lock().deleted_documents.clone()
    }

    pub fn list_store_calls(&self) -> usize {
        self.state.lock().calls.list_stores
    }

    pub fn create_store_calls(&self) -> usize {
        self.state.lock().calls.create_store
    }

    pub fn list_document_calls(&self) -> usize {
        self.state.lock().calls.list_documents
    }

    pub fn upload_calls(&self) -> usize {
        self.state.lock().calls.upload
    }

    pub fn get_operation_calls(&self) -> usize {
        self.state.lock().calls.get_operation
    }

    fn ensure_online(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Transport("remote service unreachable".to_string()));
        }
        Ok(())
    }

    fn finish(&self, state: &mut State, name: &str, ingest: PendingIngest) -> LongRunningOperation {
        let operation = match &self.ingest_failure {
            Some(message) => LongRunningOperation {
                name: name.to_string(),
                display_name: ingest.record.display_name.clone(),
                done: true,
                result: None,
                error: Some(OperationError {
                    code: Some(3),
                    message: message.clone(),
                }),
            },
            None => {
                state
                    .documents
                    .entry(ingest.store_id.clone())
                    .or_default()
                    .push(ingest.record.clone());
                LongRunningOperation {
                    name: name.to_string(),
                    display_name: ingest.record.display_name.clone(),
                    done: true,
                    result: Some(ingest.record),
                    error: None,
                }
            }
        };
        state.finished.insert(name.to_string(), operation.clone());
        operation
    }
}

fn page_of<T: Clone>(items: &[T], page_size: u32, cursor: Option<PageCursor>) -> PortResult<Page<T>> {
    let offset = match cursor {
        None => 0,
        Some(cursor) => cursor
            .as_str()
            .parse::<usize>()
            .map_err(|_| PortError::Validation(format!("bad page token {:?}", cursor.as_str())))?,
    };
    let page_size = page_size.max(1) as usize;
    let end = (offset + page_size).min(items.len());
    let slice = items.get(offset..end).unwrap_or_default();
    let next_cursor = (end < items.len()).then(|| PageCursor::new(end.to_string()));
    Ok(Page {
        items: slice.to_vec(),
        next_cursor,
    })
}

#[async_trait]
impl FileSearchService for InMemoryFileSearch {
    async fn list_stores(
        &self,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> PortResult<Page<RemoteStore>> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        state.calls.list_stores += 1;
        page_of(&state.stores, page_size, cursor)
    }

    async fn create_store(&self, display_name: &str) -> PortResult<RemoteStore> {
        self.ensure_online()?;
        self.state.lock().calls.create_store += 1;
        Ok(self.seed_store(display_name))
    }

    async fn delete_store(&self, store_id: &str, _force: bool) -> PortResult<()> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let before = state.stores.len();
        state.stores.retain(|s| s.id != store_id);
        if state.stores.len() == before {
            return Err(PortError::NotFound(store_id.to_string()));
        }
        state.documents.remove(store_id);
        Ok(())
    }

    async fn list_documents(
        &self,
        store_id: &str,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> PortResult<Page<DocumentRecord>> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        state.calls.list_documents += 1;
        let documents = state.documents.get(store_id).cloned().unwrap_or_default();
        page_of(&documents, page_size, cursor)
    }

    async fn upload_document(
        &self,
        store_id: &str,
        upload: DocumentUpload,
    ) -> PortResult<LongRunningOperation> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        state.calls.upload += 1;
        if !state.stores.iter().any(|s| s.id == store_id) {
            return Err(PortError::NotFound(store_id.to_string()));
        }

        let id = state.next_id();
        let name = format!("{}/upload/operations/op-{}", store_id, id);
        let ingest = PendingIngest {
            store_id: store_id.to_string(),
            record: DocumentRecord {
                remote_id: format!("{}/documents/doc-{}", store_id, id),
                display_name: upload.display_name.clone(),
                word_count: upload.word_count.unwrap_or(0),
                status: self.ingest_status,
            },
            remaining_polls: self.poll_rounds,
        };

        if ingest.remaining_polls == 0 {
            return Ok(self.finish(&mut state, &name, ingest));
        }
        state.pending.insert(name.clone(), ingest);
        Ok(LongRunningOperation {
            name,
            display_name: upload.display_name,
            done: false,
            result: None,
            error: None,
        })
    }

    async fn get_operation(
        &self,
        operation: &LongRunningOperation,
    ) -> PortResult<LongRunningOperation> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        state.calls.get_operation += 1;

        if let Some(finished) = state.finished.get(&operation.name) {
            return Ok(finished.clone());
        }
        let mut ingest = state
            .pending
            .remove(&operation.name)
            .ok_or_else(|| PortError::NotFound(operation.name.clone()))?;

        ingest.remaining_polls -= 1;
        if ingest.remaining_polls == 0 {
            return Ok(self.finish(&mut state, &operation.name, ingest));
        }
        state.pending.insert(operation.name.clone(), ingest);
        Ok(operation.clone())
    }

    async fn delete_document(&self, document_id: &str, _force: bool) -> PortResult<()> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let mut removed = false;
        for documents in state.documents.values_mut() {
            let before = documents.len();
            documents.retain(|d| d.remote_id != document_id);
            removed |= documents.len() != before;
        }
        if !removed {
            return Err(PortError::NotFound(document_id.to_string()));
        }
        state.deleted_documents.push(document_id.to_string());
        Ok(())
    }
}

//=========================================================================================
// Generation
//=========================================================================================

/// Answers every prompt with a fixed reply and records what it was asked.
pub struct RecordingGenerator {
    reply: Result<String, String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl RecordingGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(store_id, prompt)` pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl RetrievalGenerationService for RecordingGenerator {
    async fn generate(&self, store_id: &str, prompt: &str) -> PortResult<String> {
        self.prompts
            .lock()
            .push((store_id.to_string(), prompt.to_string()));
        self.reply
            .clone()
            .map_err(PortError::RemoteOperationFailed)
    }
}

//=========================================================================================
// Credentials
//=========================================================================================

#[derive(Default)]
pub struct InMemoryCredentials {
    users: HashMap<String, StoredCredentials>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, password: &str, role: Role) -> Self {
        let password_hash = hash_password(password).expect("hash test password");
        self.users.insert(
            username.to_string(),
            StoredCredentials {
                username: username.to_string(),
                password_hash,
                role,
            },
        );
        self
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentials {
    async fn find_credentials(&self, username: &str) -> PortResult<Option<StoredCredentials>> {
        Ok(self.users.get(username).cloned())
    }
}
