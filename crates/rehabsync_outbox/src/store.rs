//! The outbox store: single owner of record state.

use crate::backend::OutboxBackend;
use crate::error::{OutboxError, OutboxResult};
use parking_lot::RwLock;
use rehabsync_model::{Payload, SyncStatus, SyncableRecord};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

struct Inner {
    backend: Box<dyn OutboxBackend>,
    records: HashMap<Uuid, SyncableRecord>,
}

/// Durable, ordered collection of syncable records.
///
/// The store is the **single writer** of `status`, `retry_count`, and
/// `remote_id`. All other components read snapshots or request transitions
/// through it. Every mutation is appended to the backend *before* the
/// in-memory set changes, so an acknowledged write is always durable and a
/// failed write leaves no partial state.
///
/// # Thread Safety
///
/// Mutations serialize behind a write lock; snapshot reads take a read lock
/// and may run concurrently.
pub struct OutboxStore {
    inner: RwLock<Inner>,
}

impl OutboxStore {
    /// Opens a store over the given backend, replaying persisted records.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be loaded.
    pub fn open(mut backend: Box<dyn OutboxBackend>) -> OutboxResult<Self> {
        let records = backend
            .load_all()?
            .into_iter()
            .map(|r| (r.local_id, r))
            .collect::<HashMap<_, _>>();

        debug!(records = records.len(), "outbox store opened");
        Ok(Self {
            inner: RwLock::new(Inner { backend, records }),
        })
    }

    /// Appends a new `Pending` record, persisting it before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not `Pending`, the local id is
    /// already enqueued, or the durable append fails. On error the store is
    /// unchanged and the caller must treat the write as not having happened.
    pub fn enqueue(&self, record: SyncableRecord) -> OutboxResult<()> {
        if record.status != SyncStatus::Pending {
            return Err(OutboxError::NotPending(record.local_id));
        }

        let mut inner = self.inner.write();
        if inner.records.contains_key(&record.local_id) {
            return Err(OutboxError::Duplicate(record.local_id));
        }

        inner.backend.append(&record)?;
        debug!(local_id = %record.local_id, kind = ?record.kind, "record enqueued");
        inner.records.insert(record.local_id, record);
        Ok(())
    }

    /// Returns `Pending` and `Retry` records in FIFO order.
    pub fn pending_and_retrying(&self) -> Vec<SyncableRecord> {
        let inner = self.inner.read();
        let mut eligible: Vec<_> = inner
            .records
            .values()
            .filter(|r| r.is_eligible())
            .cloned()
            .collect();
        eligible.sort_by_key(SyncableRecord::fifo_key);
        eligible
    }

    /// Returns a snapshot of every record, in FIFO order.
    pub fn snapshot(&self) -> Vec<SyncableRecord> {
        let inner = self.inner.read();
        let mut all: Vec<_> = inner.records.values().cloned().collect();
        all.sort_by_key(SyncableRecord::fifo_key);
        all
    }

    /// Returns a snapshot of a single record.
    pub fn get(&self, local_id: Uuid) -> Option<SyncableRecord> {
        self.inner.read().records.get(&local_id).cloned()
    }

    /// Number of records awaiting sync (`Pending` or `Retry`).
    ///
    /// Cheap read for UI badges.
    pub fn count_pending(&self) -> usize {
        self.inner
            .read()
            .records
            .values()
            .filter(|r| r.is_eligible())
            .count()
    }

    /// Number of permanently failed records, for user prompting.
    pub fn count_failed(&self) -> usize {
        self.inner
            .read()
            .records
            .values()
            .filter(|r| r.status == SyncStatus::Failed)
            .count()
    }

    /// Total number of records held.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Marks a record `Synced`, recording the remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is unknown, the transition is illegal,
    /// or persistence fails.
    pub fn mark_synced(&self, local_id: Uuid, remote_id: String) -> OutboxResult<()> {
        self.transition(local_id, SyncStatus::Synced, |record| {
            record.remote_id = Some(remote_id);
        })
    }

    /// Marks a record `Retry`, incrementing its retry count.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is unknown, the transition is illegal,
    /// or persistence fails.
    pub fn mark_retry(&self, local_id: Uuid) -> OutboxResult<()> {
        self.transition(local_id, SyncStatus::Retry, |record| {
            record.retry_count += 1;
        })
    }

    /// Marks a record permanently `Failed`, counting the final attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is unknown, the transition is illegal,
    /// or persistence fails.
    pub fn mark_failed(&self, local_id: Uuid) -> OutboxResult<()> {
        self.transition(local_id, SyncStatus::Failed, |record| {
            record.retry_count += 1;
        })
    }

    /// Rewrites a record's payload after conflict resolution.
    ///
    /// The record keeps its status and FIFO position; only the payload and
    /// `updated_at_ms` change.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is unknown, already terminal, or
    /// persistence fails.
    pub fn replace_payload(
        &self,
        local_id: Uuid,
        payload: Payload,
        updated_at_ms: u64,
    ) -> OutboxResult<()> {
        let mut inner = self.inner.write();
        let current = inner
            .records
            .get(&local_id)
            .ok_or(OutboxError::UnknownRecord(local_id))?;
        if !current.status.is_eligible() {
            return Err(OutboxError::IllegalTransition {
                local_id,
                from: current.status,
                to: current.status,
            });
        }

        let mut updated = current.clone();
        updated.payload = payload;
        updated.updated_at_ms = updated_at_ms;

        inner.backend.append(&updated)?;
        inner.records.insert(local_id, updated);
        Ok(())
    }

    /// Retires `Synced` records and compacts the journal.
    ///
    /// Returns the number of records archived. `Pending`, `Retry`, and
    /// `Failed` records are kept: the former two are still queued, the
    /// latter must stay queryable for the UI.
    ///
    /// # Errors
    ///
    /// Returns an error if the compaction fails; the store is unchanged.
    pub fn archive_synced(&self) -> OutboxResult<usize> {
        let mut inner = self.inner.write();
        let keep: Vec<_> = inner
            .records
            .values()
            .filter(|r| r.status != SyncStatus::Synced)
            .cloned()
            .collect();
        let archived = inner.records.len() - keep.len();
        if archived == 0 {
            return Ok(0);
        }

        inner.backend.rewrite(&keep)?;
        inner.records.retain(|_, r| r.status != SyncStatus::Synced);
        debug!(archived, "synced records archived");
        Ok(archived)
    }

    /// Applies a validated status transition, persisting before mutating.
    fn transition(
        &self,
        local_id: Uuid,
        to: SyncStatus,
        apply: impl FnOnce(&mut SyncableRecord),
    ) -> OutboxResult<()> {
        let mut inner = self.inner.write();
        let current = inner
            .records
            .get(&local_id)
            .ok_or(OutboxError::UnknownRecord(local_id))?;

        if !current.status.can_transition_to(to) {
            return Err(OutboxError::IllegalTransition {
                local_id,
                from: current.status,
                to,
            });
        }

        let mut updated = current.clone();
        updated.status = to;
        apply(&mut updated);

        inner.backend.append(&updated)?;
        debug!(local_id = %local_id, status = ?to, retries = updated.retry_count, "record transitioned");
        inner.records.insert(local_id, updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use rehabsync_model::RecordKind;
    use serde_json::json;

    fn store() -> OutboxStore {
        OutboxStore::open(Box::new(MemoryBackend::new())).unwrap()
    }

    fn record(at: u64) -> SyncableRecord {
        let mut payload = Payload::new();
        payload.insert("score".into(), json!(80));
        SyncableRecord::new(RecordKind::ExerciseResult, payload, at)
    }

    #[test]
    fn enqueue_and_count() {
        let store = store();
        assert!(store.is_empty());

        store.enqueue(record(1)).unwrap();
        store.enqueue(record(2)).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.count_pending(), 2);
        assert_eq!(store.count_failed(), 0);
    }

    #[test]
    fn enqueue_rejects_duplicates_and_non_pending() {
        let store = store();
        let r = record(1);
        store.enqueue(r.clone()).unwrap();
        assert!(matches!(
            store.enqueue(r.clone()),
            Err(OutboxError::Duplicate(id)) if id == r.local_id
        ));

        let mut synced = record(2);
        synced.status = SyncStatus::Synced;
        assert!(matches!(
            store.enqueue(synced),
            Err(OutboxError::NotPending(_))
        ));
    }

    #[test]
    fn fifo_order_with_tie_break() {
        let store = store();
        let mut a = record(10);
        let mut b = record(10);
        a.local_id = Uuid::from_u128(1);
        b.local_id = Uuid::from_u128(2);
        let c = record(5);

        store.enqueue(b.clone()).unwrap();
        store.enqueue(a.clone()).unwrap();
        store.enqueue(c.clone()).unwrap();

        let order: Vec<_> = store
            .pending_and_retrying()
            .into_iter()
            .map(|r| r.local_id)
            .collect();
        assert_eq!(order, vec![c.local_id, a.local_id, b.local_id]);
    }

    #[test]
    fn mark_synced_sets_remote_id() {
        let store = store();
        let r = record(1);
        store.enqueue(r.clone()).unwrap();

        store.mark_synced(r.local_id, "srv-9".into()).unwrap();

        let stored = store.get(r.local_id).unwrap();
        assert_eq!(stored.status, SyncStatus::Synced);
        assert_eq!(stored.remote_id.as_deref(), Some("srv-9"));
        assert_eq!(store.count_pending(), 0);
    }

    #[test]
    fn mark_retry_increments_count() {
        let store = store();
        let r = record(1);
        store.enqueue(r.clone()).unwrap();

        store.mark_retry(r.local_id).unwrap();
        store.mark_retry(r.local_id).unwrap();

        let stored = store.get(r.local_id).unwrap();
        assert_eq!(stored.status, SyncStatus::Retry);
        assert_eq!(stored.retry_count, 2);
        // Retry records stay eligible.
        assert_eq!(store.count_pending(), 1);
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let store = store();
        let r = record(1);
        store.enqueue(r.clone()).unwrap();
        store.mark_failed(r.local_id).unwrap();

        assert_eq!(store.count_failed(), 1);
        assert!(matches!(
            store.mark_retry(r.local_id),
            Err(OutboxError::IllegalTransition { .. })
        ));
        assert!(matches!(
            store.mark_synced(r.local_id, "x".into()),
            Err(OutboxError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn unknown_record_errors() {
        let store = store();
        let ghost = Uuid::from_u128(99);
        assert!(matches!(
            store.mark_retry(ghost),
            Err(OutboxError::UnknownRecord(id)) if id == ghost
        ));
    }

    #[test]
    fn replace_payload_keeps_fifo_position() {
        let store = store();
        let r = record(7);
        store.enqueue(r.clone()).unwrap();

        let mut payload = Payload::new();
        payload.insert("score".into(), json!(85));
        store.replace_payload(r.local_id, payload, 9_000).unwrap();

        let stored = store.get(r.local_id).unwrap();
        assert_eq!(stored.payload["score"], json!(85));
        assert_eq!(stored.updated_at_ms, 9_000);
        assert_eq!(stored.created_at_ms, 7);
        assert_eq!(stored.status, SyncStatus::Pending);
    }

    #[test]
    fn replace_payload_rejects_terminal_records() {
        let store = store();
        let r = record(1);
        store.enqueue(r.clone()).unwrap();
        store.mark_synced(r.local_id, "srv".into()).unwrap();

        assert!(store
            .replace_payload(r.local_id, Payload::new(), 2)
            .is_err());
    }

    #[test]
    fn archive_synced_keeps_failed_and_queued() {
        let store = store();
        let a = record(1);
        let b = record(2);
        let c = record(3);
        store.enqueue(a.clone()).unwrap();
        store.enqueue(b.clone()).unwrap();
        store.enqueue(c.clone()).unwrap();

        store.mark_synced(a.local_id, "s1".into()).unwrap();
        store.mark_failed(b.local_id).unwrap();

        assert_eq!(store.archive_synced().unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get(a.local_id).is_none());
        assert!(store.get(b.local_id).is_some());
        assert!(store.get(c.local_id).is_some());

        // Nothing synced left, second archive is a no-op.
        assert_eq!(store.archive_synced().unwrap(), 0);
    }

    #[test]
    fn open_replays_persisted_journal() {
        // A journal as a previous process would have left it: the pending
        // snapshot followed by the retry snapshot of the same record.
        let pending = record(1);
        let mut retried = pending.clone();
        retried.status = SyncStatus::Retry;
        retried.retry_count = 1;

        let backend = MemoryBackend::with_entries(vec![pending, retried]);
        let store = OutboxStore::open(Box::new(backend)).unwrap();

        let queued = store.pending_and_retrying();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].status, SyncStatus::Retry);
        assert_eq!(queued[0].retry_count, 1);
    }
}
