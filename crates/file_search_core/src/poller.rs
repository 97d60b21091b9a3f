//! crates/file_search_core/src/poller.rs
//!
//! Waits for a long-running remote operation to finish.

use std::time::Duration;

use tracing::debug;

use crate::domain::{DocumentRecord, LongRunningOperation};
use crate::ports::{FileSearchService, PortError, PortResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 600;

/// Fixed-interval poller. No backoff; the attempt cap bounds the wait.
#[derive(Debug, Clone, Copy)]
pub struct OperationPoller {
    interval: Duration,
    max_attempts: u32,
}

impl Default for OperationPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_POLL_ATTEMPTS)
    }
}

impl OperationPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Re-fetches `operation` every interval until it reports `done`.
    ///
    /// The wait suspends only the calling task. A finished operation carrying an
    /// error yields `RemoteOperationFailed`; running out of attempts yields
    /// `Timeout`. Errors from fetching the status propagate as they are.
    pub async fn await_completion(
        &self,
        service: &dyn FileSearchService,
        operation: LongRunningOperation,
    ) -> PortResult<DocumentRecord> {
        let mut operation = operation;
        let mut attempts = 0u32;

        while !operation.done {
            if attempts >= self.max_attempts {
                return Err(PortError::Timeout(format!(
                    "operation {} not finished after {} polls",
                    operation.name, attempts
                )));
            }
            tokio::time::sleep(self.interval).await;
            operation = service.get_operation(&operation).await?;
            attempts += 1;
            debug!(operation = %operation.name, attempts, done = operation.done, "Polled operation");
        }

        if let Some(error) = operation.error {
            return Err(PortError::RemoteOperationFailed(error.message));
        }

        operation.result.ok_or_else(|| {
            PortError::Unexpected(format!(
                "operation {} finished without a result",
                operation.name
            ))
        })
    }
}
