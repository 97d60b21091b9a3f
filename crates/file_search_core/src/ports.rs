//! crates/file_search_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core logic depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete remote service, model provider, and credential storage.

use async_trait::async_trait;

use crate::domain::{
    DocumentRecord, DocumentUpload, LongRunningOperation, Page, PageCursor, RemoteStore,
    StoredCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and core operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("File search store is not initialized")]
    StoreUnavailable,
    #[error("Remote operation failed: {0}")]
    RemoteOperationFailed(String),
    #[error("Could not reach the remote service: {0}")]
    Transport(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote managed store holding the indexed documents.
#[async_trait]
pub trait FileSearchService: Send + Sync {
    // --- Stores ---
    async fn list_stores(
        &self,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> PortResult<Page<RemoteStore>>;

    async fn create_store(&self, display_name: &str) -> PortResult<RemoteStore>;

    async fn delete_store(&self, store_id: &str, force: bool) -> PortResult<()>;

    // --- Documents ---
    async fn list_documents(
        &self,
        store_id: &str,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> PortResult<Page<DocumentRecord>>;

    /// Starts ingestion of a document and returns the pending operation.
    async fn upload_document(
        &self,
        store_id: &str,
        upload: DocumentUpload,
    ) -> PortResult<LongRunningOperation>;

    /// Re-fetches the state of an operation returned by `upload_document`.
    async fn get_operation(
        &self,
        operation: &LongRunningOperation,
    ) -> PortResult<LongRunningOperation>;

    async fn delete_document(&self, document_id: &str, force: bool) -> PortResult<()>;
}

#[async_trait]
pub trait RetrievalGenerationService: Send + Sync {
    /// Generates an answer to `prompt` grounded in the documents of `store_id`.
    async fn generate(&self, store_id: &str, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `None` for an unknown username.
    async fn find_credentials(&self, username: &str) -> PortResult<Option<StoredCredentials>>;
}
