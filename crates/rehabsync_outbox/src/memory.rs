//! In-memory outbox backend for testing.

use crate::backend::OutboxBackend;
use crate::error::OutboxResult;
use rehabsync_model::SyncableRecord;
use std::collections::HashMap;
use uuid::Uuid;

/// An in-memory outbox backend.
///
/// Keeps the full journal in memory, including superseded snapshots, so
/// tests can assert on write history and exercise replay the same way the
/// file backend does.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Vec<SyncableRecord>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-seeded with journal entries.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_entries(entries: Vec<SyncableRecord>) -> Self {
        Self { entries }
    }

    /// Returns the raw journal, superseded snapshots included.
    #[must_use]
    pub fn entries(&self) -> &[SyncableRecord] {
        &self.entries
    }
}

impl OutboxBackend for MemoryBackend {
    fn load_all(&mut self) -> OutboxResult<Vec<SyncableRecord>> {
        let mut latest: HashMap<Uuid, SyncableRecord> = HashMap::new();
        for record in &self.entries {
            latest.insert(record.local_id, record.clone());
        }
        Ok(latest.into_values().collect())
    }

    fn append(&mut self, record: &SyncableRecord) -> OutboxResult<()> {
        self.entries.push(record.clone());
        Ok(())
    }

    fn rewrite(&mut self, records: &[SyncableRecord]) -> OutboxResult<()> {
        self.entries = records.to_vec();
        Ok(())
    }
}
