//! Outbox backend trait definition.

use crate::error::OutboxResult;
use rehabsync_model::SyncableRecord;

/// A persistence backend for the outbox store.
///
/// Backends are **record journals**: every mutation appends a full snapshot
/// of the record, and loading replays the journal to the latest state per
/// record. Backends do not interpret record semantics and never decide
/// status transitions; that is the store's job.
///
/// # Invariants
///
/// - `append` is atomic per record: after it returns, the snapshot is
///   durable; on error, nothing observable was written
/// - `load_all` returns the latest snapshot of every record that has ever
///   been appended and not compacted away (order is unspecified)
/// - `rewrite` atomically replaces the whole journal, used for compaction
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing
/// - [`super::JournalBackend`] - Append-only file for persistent storage
pub trait OutboxBackend: Send + Sync {
    /// Replays the journal and returns the latest state of each record.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be read.
    fn load_all(&mut self) -> OutboxResult<Vec<SyncableRecord>>;

    /// Durably appends a record snapshot.
    ///
    /// After this returns successfully, the snapshot survives process
    /// termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails; the caller must treat
    /// the write as not having happened.
    fn append(&mut self, record: &SyncableRecord) -> OutboxResult<()>;

    /// Atomically replaces the journal with the given records.
    ///
    /// Used when archiving synced records to compact the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement fails; the previous journal
    /// contents must remain intact in that case.
    fn rewrite(&mut self, records: &[SyncableRecord]) -> OutboxResult<()>;
}
