//! crates/file_search_core/src/catalog.rs
//!
//! Upload, listing, and name-keyed deletion of the documents in the bound
//! store. Nothing is cached: every call goes to the remote service.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::domain::{DocumentRecord, DocumentUpload, UploadContent};
use crate::pagination::{PaginatedEnumerator, DEFAULT_MAX_PAGES};
use crate::poller::OperationPoller;
use crate::ports::{FileSearchService, PortError, PortResult};
use crate::store::RemoteStoreHandle;

pub const DEFAULT_DOCUMENT_PAGE_SIZE: u32 = 20;

const READ_CHUNK: usize = 64 * 1024;

pub struct DocumentCatalog {
    store: Arc<RemoteStoreHandle>,
    service: Arc<dyn FileSearchService>,
    poller: OperationPoller,
    page_size: u32,
    max_pages: usize,
    /// Display names with an upload between the duplicate check and the end
    /// of ingestion.
    in_flight: Mutex<HashSet<String>>,
}

/// Holds a display name in `in_flight` until dropped.
struct NameReservation<'a> {
    names: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for NameReservation<'_> {
    fn drop(&mut self) {
        self.names.lock().remove(&self.name);
    }
}

impl DocumentCatalog {
    pub fn new(
        store: Arc<RemoteStoreHandle>,
        service: Arc<dyn FileSearchService>,
        poller: OperationPoller,
    ) -> Self {
        Self {
            store,
            service,
            poller,
            page_size: DEFAULT_DOCUMENT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_paging(mut self, page_size: u32, max_pages: usize) -> Self {
        self.page_size = page_size;
        self.max_pages = max_pages;
        self
    }

    /// Submits a document and waits until the remote store has ingested it.
    ///
    /// Display names are unique within the store: a name that is already
    /// present, or being uploaded by another request, is refused with
    /// `Conflict` before anything is sent.
    pub async fn upload(&self, mut upload: DocumentUpload) -> PortResult<DocumentRecord> {
        let store = self.store.require()?;
        if upload.display_name.trim().is_empty() {
            return Err(PortError::Validation("document name is empty".to_string()));
        }
        let _reservation = self.reserve(&upload.display_name)?;
        if self.find(&store.id, &upload.display_name).await?.is_some() {
            return Err(PortError::Conflict(format!(
                "a document named '{}' already exists",
                upload.display_name
            )));
        }
        if upload.word_count.is_none() {
            upload.word_count = match &upload.content {
                UploadContent::Bytes(bytes) => count_words(bytes),
                UploadContent::File { path, .. } => count_file_words(path).await?,
            };
        }

        info!("Uploading file: {}...", upload.display_name);
        let operation = self.service.upload_document(&store.id, upload).await?;
        let record = self
            .poller
            .await_completion(self.service.as_ref(), operation)
            .await?;
        info!("File uploaded: {}", record.display_name);
        Ok(record)
    }

    /// Uploads a file staged on local disk without loading it into memory.
    /// The caller keeps ownership of the file and is responsible for removing it.
    pub async fn upload_file(
        &self,
        path: &Path,
        display_name: &str,
        mime_type: &str,
    ) -> PortResult<DocumentRecord> {
        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| staged_read_error(path, e))?
            .len();
        self.upload(DocumentUpload {
            display_name: display_name.to_string(),
            mime_type: mime_type.to_string(),
            content: UploadContent::File {
                path: path.to_path_buf(),
                len,
            },
            word_count: None,
        })
        .await
    }

    /// Every document of the bound store, in remote order.
    pub async fn list(&self) -> PortResult<Vec<DocumentRecord>> {
        let store = self.store.require()?;
        let service = &self.service;
        let store_id = store.id.as_str();
        let page_size = self.page_size;
        let documents =
            PaginatedEnumerator::new(move |cursor| service.list_documents(store_id, page_size, cursor))
                .with_max_pages(self.max_pages)
                .collect()
                .await?;
        Ok(documents)
    }

    /// Deletes the first document whose display name matches exactly.
    /// Returns `false` when no document matches.
    pub async fn delete_by_display_name(&self, display_name: &str) -> PortResult<bool> {
        let store = self.store.require()?;
        info!("Looking for document: {}...", display_name);

        let Some(document) = self.find(&store.id, display_name).await? else {
            info!("Document not found: {}", display_name);
            return Ok(false);
        };

        self.service.delete_document(&document.remote_id, true).await?;
        info!("Document deleted: {}", display_name);
        Ok(true)
    }

    fn reserve(&self, display_name: &str) -> PortResult<NameReservation<'_>> {
        if !self.in_flight.lock().insert(display_name.to_string()) {
            return Err(PortError::Conflict(format!(
                "an upload of '{}' is already in progress",
                display_name
            )));
        }
        Ok(NameReservation {
            names: &self.in_flight,
            name: display_name.to_string(),
        })
    }

    async fn find(&self, store_id: &str, display_name: &str) -> PortResult<Option<DocumentRecord>> {
        let service = &self.service;
        let page_size = self.page_size;
        PaginatedEnumerator::new(move |cursor| service.list_documents(store_id, page_size, cursor))
            .with_max_pages(self.max_pages)
            .find(|document| document.display_name == display_name)
            .await
    }
}

fn staged_read_error(path: &Path, e: std::io::Error) -> PortError {
    PortError::Unexpected(format!("Failed to read staged upload {}: {}", path.display(), e))
}

/// Whitespace-separated word count of UTF-8 text fed in arbitrary chunks.
/// Multi-byte characters may straddle chunk boundaries.
#[derive(Default)]
struct WordCounter {
    words: u64,
    in_word: bool,
    pending: Vec<u8>,
    binary: bool,
}

impl WordCounter {
    fn feed(&mut self, chunk: &[u8]) {
        if self.binary {
            return;
        }
        self.pending.extend_from_slice(chunk);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // An incomplete sequence at the end waits for the next chunk.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                self.binary = true;
                return;
            }
        };

        let text = std::str::from_utf8(&self.pending[..valid_up_to]).unwrap_or_default();
        for c in text.chars() {
            if c.is_whitespace() {
                self.in_word = false;
            } else if !self.in_word {
                self.in_word = true;
                self.words += 1;
            }
        }
        self.pending.drain(..valid_up_to);
    }

    /// `None` for content that is not UTF-8 text.
    fn finish(self) -> Option<u64> {
        if self.binary || !self.pending.is_empty() {
            warn!("Upload is not UTF-8 text; word count left to the remote service");
            return None;
        }
        Some(self.words)
    }
}

fn count_words(content: &[u8]) -> Option<u64> {
    let mut counter = WordCounter::default();
    counter.feed(content);
    counter.finish()
}

async fn count_file_words(path: &Path) -> PortResult<Option<u64>> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| staged_read_error(path, e))?;
    let mut buf = vec![0u8; READ_CHUNK];
    let mut counter = WordCounter::default();
    loop {
        let n = file.read(&mut buf).await.map_err(|e| staged_read_error(path, e))?;
        if n == 0 {
            break;
        }
        counter.feed(&buf[..n]);
    }
    Ok(counter.finish())
}
