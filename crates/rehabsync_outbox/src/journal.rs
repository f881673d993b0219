//! File-based journal backend for persistent storage.

use crate::backend::OutboxBackend;
use crate::error::{OutboxError, OutboxResult};
use rehabsync_model::SyncableRecord;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// An append-only file journal backend.
///
/// Each record snapshot is one JSON document per line. Appends are flushed
/// and fsynced before returning, so an acknowledged enqueue or status
/// transition survives process death.
///
/// # Recovery
///
/// On load, lines are replayed in order and the latest snapshot per record
/// wins. A torn final line (crash mid-append) is truncated away with a
/// warning, so the next append starts on a fresh line instead of gluing
/// onto the fragment. Corruption before the tail is an error, since
/// snapshots after it would silently be lost.
#[derive(Debug)]
pub struct JournalBackend {
    path: PathBuf,
    file: File,
}

impl JournalBackend {
    /// Opens or creates a journal at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> OutboxResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Opens or creates a journal, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> OutboxResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutboxBackend for JournalBackend {
    fn load_all(&mut self) -> OutboxResult<Vec<SyncableRecord>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut latest: HashMap<Uuid, SyncableRecord> = HashMap::new();
        let mut line = String::new();
        let mut valid_len: u64 = 0;
        let mut line_no = 0usize;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            line_no += 1;
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                valid_len += read as u64;
                continue;
            }
            match serde_json::from_str::<SyncableRecord>(trimmed) {
                Ok(record) => {
                    latest.insert(record.local_id, record);
                    valid_len += read as u64;
                }
                Err(e) => {
                    if reader.fill_buf()?.is_empty() {
                        // Torn tail from a crash mid-append. Cut it off so
                        // the next append does not glue onto the fragment.
                        warn!(line = line_no, error = %e, "truncating torn journal tail");
                        self.file.set_len(valid_len)?;
                        self.file.sync_data()?;
                        break;
                    }
                    return Err(OutboxError::Corrupted(format!(
                        "unreadable journal line {line_no}: {e}"
                    )));
                }
            }
        }

        debug!(records = latest.len(), path = %self.path.display(), "journal replayed");
        Ok(latest.into_values().collect())
    }

    fn append(&mut self, record: &SyncableRecord) -> OutboxResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn rewrite(&mut self, records: &[SyncableRecord]) -> OutboxResult<()> {
        let tmp_path = self.path.with_extension("compact");
        let mut tmp = File::create(&tmp_path)?;
        for record in records {
            let mut line = serde_json::to_string(record)?;
            line.push('\n');
            tmp.write_all(line.as_bytes())?;
        }
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        debug!(records = records.len(), path = %self.path.display(), "journal compacted");
        Ok(())
    }
}
