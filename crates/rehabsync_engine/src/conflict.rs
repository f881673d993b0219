//! Conflict resolution strategies.

use rehabsync_model::{Payload, SyncableRecord};
use serde_json::Value;

/// The remote's version of a record, as returned by conflict detection.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Identifier of the record on the remote.
    pub remote_id: String,
    /// The remote's payload.
    pub payload: Payload,
    /// The remote's last-modified timestamp (epoch milliseconds).
    pub updated_at_ms: u64,
}

impl RemoteRecord {
    /// Creates a remote record.
    pub fn new(remote_id: impl Into<String>, payload: Payload, updated_at_ms: u64) -> Self {
        Self {
            remote_id: remote_id.into(),
            payload,
            updated_at_ms,
        }
    }
}

/// What to do with the reconciled record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    /// The remote version stands; mark the local record synced as-is.
    AcceptRemote,
    /// The reconciled payload must be pushed to the remote.
    Resubmit,
}

/// The outcome of resolving one conflict.
///
/// The reconciled payload is persisted locally under the record's existing
/// `local_id`; `updated_at_ms` is never earlier than either input version.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The reconciled payload to persist locally.
    pub payload: Payload,
    /// Timestamp for the reconciled record.
    pub updated_at_ms: u64,
    /// Whether the reconciled payload must be re-submitted.
    pub action: ResolutionAction,
}

/// Deterministic rule for reconciling a local record against the remote's
/// version of the same logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// The remote payload fully replaces the local one.
    ServerWins,
    /// The local payload is pushed as-is, overwriting the remote.
    ClientWins,
    /// The chronologically later version wins whole-record. Equal
    /// timestamps resolve in the remote's favor.
    LatestWins,
    /// List fields declared by the record's kind merge by set-union;
    /// scalars fall back to latest-wins.
    Merge,
}

impl ConflictStrategy {
    /// Resolves a conflict between `local` and `remote`.
    pub fn resolve(&self, local: &SyncableRecord, remote: &RemoteRecord) -> Resolution {
        let updated_at_ms = local.updated_at_ms.max(remote.updated_at_ms);
        match self {
            ConflictStrategy::ServerWins => Resolution {
                payload: remote.payload.clone(),
                updated_at_ms,
                action: ResolutionAction::AcceptRemote,
            },
            ConflictStrategy::ClientWins => Resolution {
                payload: local.payload.clone(),
                updated_at_ms,
                action: ResolutionAction::Resubmit,
            },
            ConflictStrategy::LatestWins => {
                if local.updated_at_ms > remote.updated_at_ms {
                    Resolution {
                        payload: local.payload.clone(),
                        updated_at_ms,
                        action: ResolutionAction::Resubmit,
                    }
                } else {
                    Resolution {
                        payload: remote.payload.clone(),
                        updated_at_ms,
                        action: ResolutionAction::AcceptRemote,
                    }
                }
            }
            ConflictStrategy::Merge => Resolution {
                payload: merge_payloads(local, remote),
                updated_at_ms,
                action: ResolutionAction::Resubmit,
            },
        }
    }
}

/// Merges two payloads: declared list fields union, scalars latest-wins.
fn merge_payloads(local: &SyncableRecord, remote: &RemoteRecord) -> Payload {
    let local_is_newer = local.updated_at_ms > remote.updated_at_ms;
    let (newer, older): (&Payload, &Payload) = if local_is_newer {
        (&local.payload, &remote.payload)
    } else {
        (&remote.payload, &local.payload)
    };

    // Scalars: newer wins, fields only the older side has are kept.
    let mut merged = newer.clone();
    for (key, value) in older {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }

    // Declared list fields: order-preserving set-union, local items first.
    for field in local.kind.merge_list_fields() {
        let local_items = list_items(&local.payload, field);
        let remote_items = list_items(&remote.payload, field);
        if local_items.is_empty() && remote_items.is_empty() {
            continue;
        }

        let mut union = local_items;
        for item in remote_items {
            if !union.contains(&item) {
                union.push(item);
            }
        }
        merged.insert((*field).to_string(), Value::Array(union));
    }

    merged
}

fn list_items(payload: &Payload, field: &str) -> Vec<Value> {
    match payload.get(field) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
