//! crates/file_search_core/src/pagination.rs
//!
//! Cursor-following traversal over a remote catalog.
//!
//! An enumerator wraps a page fetcher. The fetcher is called with `None` for the
//! first page and with the previous page's `next_cursor` afterwards; a page
//! without a cursor is the last one. Enumeration is one-shot and forward-only:
//! every traversal method consumes the enumerator, so a cursor can never leak
//! into a different query.

use std::future::Future;
use std::ops::ControlFlow;

use tracing::debug;

use crate::domain::{Page, PageCursor};
use crate::ports::{PortError, PortResult};

/// Default upper bound on the number of pages a single traversal may fetch.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Summary of a finished traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traversal {
    pub pages: usize,
    pub visited: usize,
    pub stopped_early: bool,
}

pub struct PaginatedEnumerator<F> {
    fetch_page: F,
    max_pages: usize,
}

impl<F> PaginatedEnumerator<F> {
    pub fn new(fetch_page: F) -> Self {
        Self {
            fetch_page,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Caps the traversal; fetching past the cap fails with `PortError::Timeout`.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Visits every element in page order until the catalog is exhausted or
    /// `visit` breaks. A break stops immediately: no later element is visited
    /// and no further page is fetched.
    pub async fn for_each_page<T, Fut, V>(mut self, mut visit: V) -> PortResult<Traversal>
    where
        F: FnMut(Option<PageCursor>) -> Fut,
        Fut: Future<Output = PortResult<Page<T>>>,
        V: FnMut(T) -> ControlFlow<()>,
    {
        let mut traversal = Traversal::default();
        let mut cursor = None;

        loop {
            if traversal.pages >= self.max_pages {
                return Err(PortError::Timeout(format!(
                    "enumeration still had pages left after {} pages",
                    self.max_pages
                )));
            }

            let page = (self.fetch_page)(cursor.take()).await?;
            traversal.pages += 1;
            debug!(
                page = traversal.pages,
                items = page.items.len(),
                has_next = page.next_cursor.is_some(),
                "Fetched page"
            );

            for item in page.items {
                traversal.visited += 1;
                if visit(item).is_break() {
                    traversal.stopped_early = true;
                    return Ok(traversal);
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(traversal),
            }
        }
    }

    /// Returns the first element matching `predicate`, stopping there.
    pub async fn find<T, Fut, P>(self, mut predicate: P) -> PortResult<Option<T>>
    where
        F: FnMut(Option<PageCursor>) -> Fut,
        Fut: Future<Output = PortResult<Page<T>>>,
        P: FnMut(&T) -> bool,
    {
        let mut found = None;
        self.for_each_page(|item| {
            if predicate(&item) {
                found = Some(item);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
        Ok(found)
    }

    /// Materializes the whole catalog.
    pub async fn collect<T, Fut>(self) -> PortResult<Vec<T>>
    where
        F: FnMut(Option<PageCursor>) -> Fut,
        Fut: Future<Output = PortResult<Page<T>>>,
    {
        let mut items = Vec::new();
        self.for_each_page(|item| {
            items.push(item);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(items)
    }
}
