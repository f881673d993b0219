//! Error types for outbox operations.

use rehabsync_model::SyncStatus;
use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Result type for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Errors that can occur during outbox operations.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// An I/O error occurred while persisting or loading records.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("record serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// The journal contains data that cannot be replayed.
    #[error("outbox journal corrupted: {0}")]
    Corrupted(String),

    /// A record with this local id is already enqueued.
    #[error("record {0} is already enqueued")]
    Duplicate(Uuid),

    /// No record with this local id exists.
    #[error("unknown record {0}")]
    UnknownRecord(Uuid),

    /// Only `Pending` records may be enqueued.
    #[error("record {0} is not in pending state")]
    NotPending(Uuid),

    /// The requested status transition is not allowed by the state machine.
    #[error("illegal transition for record {local_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        /// The record's local id.
        local_id: Uuid,
        /// Current status.
        from: SyncStatus,
        /// Requested status.
        to: SyncStatus,
    },
}
