//! Error taxonomy for sync operations.

use crate::conflict::RemoteRecord;
use rehabsync_outbox::OutboxError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors arising while syncing a record or running a pass.
///
/// Per-record remote errors (`Network`, `Timeout`, `Server`, `Validation`,
/// `Conflict`) are fully contained within the executor and never escape
/// `run_pass`; only `Storage` errors propagate, aborting the pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The network is unreachable. Retried with backoff.
    #[error("network unreachable: {0}")]
    Network(String),

    /// The remote call exceeded the configured timeout. Retried.
    #[error("remote call timed out")]
    Timeout,

    /// The remote reported a transient server-side failure (5xx). Retried.
    #[error("server error: {0}")]
    Server(String),

    /// The remote rejected the payload. Permanent; never retried.
    #[error("validation rejected: {0}")]
    Validation(String),

    /// The remote already holds a version of this record. Resolved locally,
    /// not treated as a failure.
    #[error("remote holds a conflicting version (remote id {})", .0.remote_id)]
    Conflict(RemoteRecord),

    /// Critical local storage failure. Aborts the current pass.
    #[error("outbox storage error: {0}")]
    Storage(#[from] OutboxError),
}

impl SyncError {
    /// Returns true if retrying this error can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Timeout | SyncError::Server(_)
        )
    }

    /// Returns true if this error aborts the whole pass rather than
    /// affecting a single record.
    pub fn is_critical(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }
}
