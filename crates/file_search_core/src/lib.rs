pub mod access;
pub mod catalog;
pub mod domain;
pub mod pagination;
pub mod poller;
pub mod ports;
pub mod query;
pub mod store;
pub mod token;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use access::{authorize, AccessDenied, AccessTier, Authenticator};
pub use catalog::DocumentCatalog;
pub use domain::{
    DocumentRecord, DocumentStatus, DocumentUpload, LongRunningOperation, OperationError, Page,
    PageCursor, Principal, RemoteStore, Role, StoredCredentials, UploadContent,
};
pub use pagination::PaginatedEnumerator;
pub use poller::OperationPoller;
pub use ports::{
    CredentialStore, FileSearchService, PortError, PortResult, RetrievalGenerationService,
};
pub use query::QueryGateway;
pub use store::RemoteStoreHandle;
pub use token::{AuthFailure, SessionToken, TokenAuthority};
