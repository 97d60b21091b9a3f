//! services/gateway/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use file_search_core::{
    Authenticator, DocumentCatalog, QueryGateway, RemoteStoreHandle, TokenAuthority,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenAuthority>,
    pub authenticator: Arc<Authenticator>,
    pub store: Arc<RemoteStoreHandle>,
    pub catalog: Arc<DocumentCatalog>,
    pub query: Arc<QueryGateway>,
}
