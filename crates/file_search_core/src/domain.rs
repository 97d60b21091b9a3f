//! crates/file_search_core/src/domain.rs
//!
//! Defines the pure, core data structures for the gateway.
//! These structs are independent of any HTTP layer or remote wire format.

use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;

/// The authorization role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Parses the textual form used in tokens. Unknown names are rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Credentials as held by the credential store. Only used during login.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// The remote file-search store the gateway is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStore {
    /// Remote resource name, e.g. `fileSearchStores/abc123`.
    pub id: String,
    pub display_name: String,
}

/// Ingestion state of a document inside the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentStatus {
    Processing,
    Ready,
    Failed,
    #[default]
    Unknown,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
            DocumentStatus::Unknown => "unknown",
        }
    }
}

/// A document held by the remote store. `display_name` is the key clients use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub remote_id: String,
    pub display_name: String,
    pub word_count: u64,
    pub status: DocumentStatus,
}

/// Body of a document upload.
#[derive(Debug, Clone)]
pub enum UploadContent {
    Bytes(Bytes),
    /// Staged on local disk and streamed when sent.
    File { path: PathBuf, len: u64 },
}

impl UploadContent {
    pub fn len(&self) -> u64 {
        match self {
            UploadContent::Bytes(bytes) => bytes.len() as u64,
            UploadContent::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Bytes> for UploadContent {
    fn from(bytes: Bytes) -> Self {
        UploadContent::Bytes(bytes)
    }
}

/// Content submitted to the remote store for ingestion.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub display_name: String,
    pub mime_type: String,
    pub content: UploadContent,
    pub word_count: Option<u64>,
}

/// Error reported by the remote service for a finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    pub code: Option<i32>,
    pub message: String,
}

/// An asynchronous remote task (document ingestion) that has to be polled.
#[derive(Debug, Clone)]
pub struct LongRunningOperation {
    pub name: String,
    /// Display name of the document being ingested.
    pub display_name: String,
    pub done: bool,
    pub result: Option<DocumentRecord>,
    pub error: Option<OperationError>,
}

/// Opaque continuation token of one enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a remote catalog.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` on the last page.
    pub next_cursor: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}
