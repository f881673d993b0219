//! Sync status state machine.

use serde::{Deserialize, Serialize};

/// The sync status of a record.
///
/// # State machine
///
/// ```text
/// Pending ──┬──> Synced (terminal)
///           ├──> Retry ──┬──> Synced (terminal)
///           │            ├──> Retry
///           │            └──> Failed (terminal)
///           └──> Failed (terminal)
/// ```
///
/// `Pending` and `Retry` are both eligible for dequeue; the only difference
/// is presentation and backoff timing. There is no transition out of
/// `Synced` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Created locally, not yet attempted.
    Pending,
    /// At least one attempt failed; will be retried.
    Retry,
    /// Accepted by the remote. Terminal.
    Synced,
    /// Exhausted retries or permanently rejected. Terminal.
    Failed,
}

impl SyncStatus {
    /// Returns true if a record in this status is eligible for a sync pass.
    pub fn is_eligible(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Retry)
    }

    /// Returns true if this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Synced | SyncStatus::Failed)
    }

    /// Returns true if the transition `self -> to` is legal.
    pub fn can_transition_to(&self, to: SyncStatus) -> bool {
        match self {
            SyncStatus::Pending | SyncStatus::Retry => {
                matches!(to, SyncStatus::Retry | SyncStatus::Synced | SyncStatus::Failed)
            }
            SyncStatus::Synced | SyncStatus::Failed => false,
        }
    }
}
