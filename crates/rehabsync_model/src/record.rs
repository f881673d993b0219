//! Syncable records.

use crate::status::SyncStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque domain payload: a map of domain fields (score, timestamps,
/// identifiers) specific to the record's kind.
pub type Payload = serde_json::Map<String, Value>;

/// Discriminator for syncable records.
///
/// The kind determines which remote endpoint a record is submitted to and
/// which fields participate in merge conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A single completed exercise with its score.
    ExerciseResult,
    /// A rehabilitation session grouping multiple exercises.
    Session,
}

impl RecordKind {
    /// The remote endpoint path segment for this kind.
    pub fn endpoint(&self) -> &'static str {
        match self {
            RecordKind::ExerciseResult => "exercise-results",
            RecordKind::Session => "sessions",
        }
    }

    /// List-valued payload fields that merge by set-union under the
    /// `Merge` conflict strategy. Scalars fall back to latest-wins.
    pub fn merge_list_fields(&self) -> &'static [&'static str] {
        match self {
            RecordKind::ExerciseResult => &[],
            RecordKind::Session => &["exercises"],
        }
    }
}

/// A locally created record awaiting (or having completed) synchronization.
///
/// # Fields
///
/// - `local_id`: locally unique, assigned at creation, immutable
/// - `kind`: determines the remote endpoint and merge behavior
/// - `payload`: opaque domain fields
/// - `created_at_ms`: client timestamp; the FIFO ordering key
/// - `updated_at_ms`: bumped when conflict resolution rewrites the payload
/// - `status`: the sync state machine position
/// - `retry_count`: failed attempts so far; never decreases
/// - `remote_id`: set once the remote accepts the record
///
/// # Invariants
///
/// - `Some(remote_id)` together with `SyncStatus::Synced` is the durability
///   proof that the remote holds this record
/// - `retry_count` is monotonically non-decreasing until a terminal state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncableRecord {
    /// Locally unique identifier.
    pub local_id: Uuid,
    /// Record kind.
    pub kind: RecordKind,
    /// Opaque domain payload.
    pub payload: Payload,
    /// Creation timestamp (epoch milliseconds, client clock).
    pub created_at_ms: u64,
    /// Last modification timestamp (epoch milliseconds).
    pub updated_at_ms: u64,
    /// Current sync status.
    pub status: SyncStatus,
    /// Number of failed sync attempts.
    pub retry_count: u32,
    /// Remote identifier, once accepted.
    pub remote_id: Option<String>,
}

impl SyncableRecord {
    /// Creates a new pending record with a fresh local id.
    pub fn new(kind: RecordKind, payload: Payload, created_at_ms: u64) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            kind,
            payload,
            created_at_ms,
            updated_at_ms: created_at_ms,
            status: SyncStatus::Pending,
            retry_count: 0,
            remote_id: None,
        }
    }

    /// The FIFO ordering key: creation time, ties broken by local id.
    pub fn fifo_key(&self) -> (u64, Uuid) {
        (self.created_at_ms, self.local_id)
    }

    /// Returns true if this record should be picked up by a sync pass.
    pub fn is_eligible(&self) -> bool {
        self.status.is_eligible()
    }
}
