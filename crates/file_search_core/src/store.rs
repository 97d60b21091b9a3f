//! crates/file_search_core/src/store.rs
//!
//! Owns the process-wide binding to the remote file-search store.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::RemoteStore;
use crate::pagination::{PaginatedEnumerator, DEFAULT_MAX_PAGES};
use crate::ports::{FileSearchService, PortError, PortResult};

pub const DEFAULT_STORE_PAGE_SIZE: u32 = 10;

/// Holds at most one bound store. Binding happens through `acquire`, which is
/// serialized so concurrent callers cannot create duplicate stores.
pub struct RemoteStoreHandle {
    service: Arc<dyn FileSearchService>,
    page_size: u32,
    max_pages: usize,
    bound: RwLock<Option<RemoteStore>>,
    init: Mutex<()>,
}

impl RemoteStoreHandle {
    pub fn new(service: Arc<dyn FileSearchService>) -> Self {
        Self {
            service,
            page_size: DEFAULT_STORE_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            bound: RwLock::new(None),
            init: Mutex::new(()),
        }
    }

    pub fn with_paging(mut self, page_size: u32, max_pages: usize) -> Self {
        self.page_size = page_size;
        self.max_pages = max_pages;
        self
    }

    /// Finds the store named `display_name`, creating it when no page of the
    /// remote catalog contains it, and binds the handle to it.
    ///
    /// Idempotent: once bound, asking for the same name returns the bound store
    /// without remote calls. Asking for a different name fails with `Conflict`.
    pub async fn acquire(&self, display_name: &str) -> PortResult<RemoteStore> {
        let _guard = self.init.lock().await;

        if let Some(store) = self.current() {
            if store.display_name == display_name {
                return Ok(store);
            }
            return Err(PortError::Conflict(format!(
                "already bound to store '{}'",
                store.display_name
            )));
        }

        info!("Looking for file search store '{}'...", display_name);
        let service = &self.service;
        let page_size = self.page_size;
        let existing = PaginatedEnumerator::new(move |cursor| service.list_stores(page_size, cursor))
            .with_max_pages(self.max_pages)
            .find(|store| store.display_name == display_name)
            .await?;

        let store = match existing {
            Some(store) => {
                info!("Found store: {}", store.id);
                store
            }
            None => {
                info!("Store not found. Creating a new store...");
                let store = self.service.create_store(display_name).await?;
                info!("Created store: {}", store.id);
                store
            }
        };

        *self.bound.write() = Some(store.clone());
        Ok(store)
    }

    /// The bound store, if any. Never waits on an in-flight `acquire`.
    pub fn current(&self) -> Option<RemoteStore> {
        self.bound.read().clone()
    }

    pub fn require(&self) -> PortResult<RemoteStore> {
        self.current().ok_or(PortError::StoreUnavailable)
    }

    /// Force-deletes the bound store remotely, documents included, and unbinds.
    pub async fn delete_store(&self) -> PortResult<()> {
        let _guard = self.init.lock().await;
        let store = self.require()?;

        info!("Deleting store: {}...", store.id);
        self.service.delete_store(&store.id, true).await?;
        *self.bound.write() = None;
        info!("Store deleted");
        Ok(())
    }
}
