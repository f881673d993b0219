//! The sync executor: one serialized pass over the outbox.

use crate::config::SyncConfig;
use crate::conflict::{RemoteRecord, ResolutionAction};
use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteTransport;
use parking_lot::Mutex;
use rehabsync_model::SyncableRecord;
use rehabsync_outbox::OutboxStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Records the pass attempted to submit.
    pub attempted: usize,
    /// Records accepted by the remote.
    pub synced: usize,
    /// Records scheduled for another attempt.
    pub retried: usize,
    /// Records permanently failed.
    pub failed: usize,
    /// Conflicts reconciled during the pass.
    pub conflicts_resolved: usize,
    /// Soonest wait among retried and still-deferred records, if any. The
    /// scheduler arms a retry deadline from this.
    pub next_retry_delay: Option<Duration>,
}

/// Outcome of a coalescing pass request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran to completion.
    Completed(PassReport),
    /// Another pass was already in flight; this request was a no-op.
    AlreadyRunning,
}

/// Anything that can run a sync pass. Lets the scheduler stay independent
/// of the concrete transport type.
pub trait PassRunner: Send + Sync {
    /// Runs a pass unless one is already in flight.
    ///
    /// # Errors
    ///
    /// Returns an error only on critical storage failure.
    fn try_run_pass(&self) -> SyncResult<PassOutcome>;
}

/// Drives sync passes: dequeues eligible records in FIFO order, submits
/// them to the remote, resolves conflicts, and applies retry/backoff
/// bookkeeping through the outbox store.
///
/// # Concurrency
///
/// A pass guard serializes execution: concurrent `run_pass` callers block
/// and run strictly one after another, never interleaving per-record work.
/// `try_run_pass` coalesces instead of blocking.
///
/// # Backoff
///
/// A `Retry` record is not re-submitted until its computed backoff delay
/// has elapsed; passes running earlier defer it and surface the remaining
/// wait in the report. Deadlines live in memory only, so after a restart
/// every eligible record is due immediately.
pub struct SyncExecutor<T: RemoteTransport> {
    store: Arc<OutboxStore>,
    transport: Arc<T>,
    config: SyncConfig,
    pass_guard: Mutex<()>,
    retry_after: Mutex<HashMap<Uuid, Instant>>,
}

impl<T: RemoteTransport> SyncExecutor<T> {
    /// Creates a new executor over the given store and transport.
    pub fn new(store: Arc<OutboxStore>, transport: Arc<T>, config: SyncConfig) -> Self {
        Self {
            store,
            transport,
            config,
            pass_guard: Mutex::new(()),
            retry_after: Mutex::new(HashMap::new()),
        }
    }

    /// The outbox store this executor drives.
    pub fn store(&self) -> &Arc<OutboxStore> {
        &self.store
    }

    /// Performs one sync pass, blocking if another pass is in flight.
    ///
    /// Safe to call redundantly: a pass with nothing eligible is a no-op,
    /// already-synced records are never re-submitted, and `Retry` records
    /// still inside their backoff window are deferred untouched.
    ///
    /// # Errors
    ///
    /// Returns an error only on critical storage failure. Records already
    /// committed during this pass remain committed; the in-flight record is
    /// left at its last-committed state.
    pub fn run_pass(&self) -> SyncResult<PassReport> {
        let _guard = self.pass_guard.lock();
        self.run_locked()
    }

    fn run_locked(&self) -> SyncResult<PassReport> {
        let eligible = self.store.pending_and_retrying();
        let mut report = PassReport::default();
        if eligible.is_empty() {
            debug!("sync pass: nothing eligible");
            return Ok(report);
        }

        debug!(eligible = eligible.len(), "sync pass started");
        let now = Instant::now();
        for record in eligible {
            let deferred = self
                .retry_after
                .lock()
                .get(&record.local_id)
                .copied()
                .filter(|due| *due > now);
            if let Some(due) = deferred {
                let remaining = due - now;
                debug!(local_id = %record.local_id, ?remaining, "backoff not elapsed, deferred");
                report.next_retry_delay =
                    Some(report.next_retry_delay.map_or(remaining, |d| d.min(remaining)));
                continue;
            }
            self.retry_after.lock().remove(&record.local_id);

            report.attempted += 1;
            match self.transport.submit(record.kind, &record.payload) {
                Ok(remote_id) => {
                    self.store.mark_synced(record.local_id, remote_id)?;
                    report.synced += 1;
                }
                Err(SyncError::Conflict(remote)) => {
                    self.resolve_conflict(&record, remote, &mut report)?;
                }
                Err(SyncError::Storage(e)) => return Err(e.into()),
                Err(e) if e.is_retryable() => {
                    warn!(local_id = %record.local_id, error = %e, "transient failure");
                    self.retry_or_fail(&record, &mut report)?;
                }
                Err(e) => {
                    warn!(local_id = %record.local_id, error = %e, "permanent rejection");
                    self.store.mark_failed(record.local_id)?;
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            retried = report.retried,
            failed = report.failed,
            conflicts = report.conflicts_resolved,
            "sync pass finished"
        );
        Ok(report)
    }

    /// Reconciles a conflicting record and, if required, re-submits the
    /// reconciled payload once. A second failure falls back to normal
    /// retry handling.
    fn resolve_conflict(
        &self,
        record: &SyncableRecord,
        remote: RemoteRecord,
        report: &mut PassReport,
    ) -> SyncResult<()> {
        let resolution = self.config.conflict_strategy.resolve(record, &remote);
        debug!(
            local_id = %record.local_id,
            strategy = ?self.config.conflict_strategy,
            action = ?resolution.action,
            "conflict resolved"
        );
        self.store.replace_payload(
            record.local_id,
            resolution.payload.clone(),
            resolution.updated_at_ms,
        )?;
        report.conflicts_resolved += 1;

        match resolution.action {
            ResolutionAction::AcceptRemote => {
                self.store.mark_synced(record.local_id, remote.remote_id)?;
                report.synced += 1;
            }
            ResolutionAction::Resubmit => {
                match self.transport.submit(record.kind, &resolution.payload) {
                    Ok(remote_id) => {
                        self.store.mark_synced(record.local_id, remote_id)?;
                        report.synced += 1;
                    }
                    Err(SyncError::Storage(e)) => return Err(e.into()),
                    Err(SyncError::Validation(reason)) => {
                        warn!(local_id = %record.local_id, %reason, "reconciled payload rejected");
                        self.store.mark_failed(record.local_id)?;
                        report.failed += 1;
                    }
                    Err(e) => {
                        warn!(local_id = %record.local_id, error = %e, "resubmit failed");
                        self.retry_or_fail(record, report)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies the backoff policy after a failed attempt.
    fn retry_or_fail(&self, record: &SyncableRecord, report: &mut PassReport) -> SyncResult<()> {
        let failures = record.retry_count + 1;
        if self.config.backoff.is_exhausted(failures) {
            warn!(local_id = %record.local_id, failures, "retries exhausted, giving up");
            self.store.mark_failed(record.local_id)?;
            report.failed += 1;
        } else {
            self.store.mark_retry(record.local_id)?;
            report.retried += 1;
            let delay = self.config.backoff.delay_for(failures);
            if !delay.is_zero() {
                self.retry_after
                    .lock()
                    .insert(record.local_id, Instant::now() + delay);
            }
            report.next_retry_delay =
                Some(report.next_retry_delay.map_or(delay, |d| d.min(delay)));
        }
        Ok(())
    }
}

impl<T: RemoteTransport> PassRunner for SyncExecutor<T> {
    fn try_run_pass(&self) -> SyncResult<PassOutcome> {
        match self.pass_guard.try_lock() {
            Some(_guard) => self.run_locked().map(PassOutcome::Completed),
            None => Ok(PassOutcome::AlreadyRunning),
        }
    }
}
