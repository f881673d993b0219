//! Remote transport abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use rehabsync_model::{Payload, RecordKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Network communication with the remote API.
///
/// The engine treats the remote as opaque: one record in, one remote id (or
/// categorized error) out. Implementations are expected to respect the
/// configured remote timeout and to surface a conflict as
/// [`SyncError::Conflict`] carrying the remote's version of the record.
pub trait RemoteTransport: Send + Sync {
    /// Submits one record's payload to the endpoint named by
    /// [`RecordKind::endpoint`].
    ///
    /// Returns the remote id assigned by the server. The call must not
    /// outlive the transport's configured timeout; on expiry it returns
    /// [`SyncError::Timeout`].
    ///
    /// # Errors
    ///
    /// - [`SyncError::Network`] / [`SyncError::Timeout`] /
    ///   [`SyncError::Server`]: transient, retried with backoff
    /// - [`SyncError::Validation`]: permanent rejection
    /// - [`SyncError::Conflict`]: the remote already holds this record
    fn submit(&self, kind: RecordKind, payload: &Payload) -> SyncResult<String>;
}

/// A scripted transport for testing.
///
/// Outcomes are consumed in submission order; once the script is exhausted
/// every submission succeeds with a generated remote id. Every submission
/// is recorded with the endpoint it was posted to, so tests can assert on
/// ordering and routing.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<SyncResult<String>>>,
    submissions: Mutex<Vec<(&'static str, Payload)>>,
    next_id: AtomicU64,
}

impl MockTransport {
    /// Creates a transport that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome for the next unscripted submission.
    pub fn push_outcome(&self, outcome: SyncResult<String>) {
        self.script.lock().push_back(outcome);
    }

    /// Queues `n` successful outcomes.
    pub fn push_successes(&self, n: usize) {
        let mut script = self.script.lock();
        for _ in 0..n {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            script.push_back(Ok(format!("remote-{id}")));
        }
    }

    /// Returns every `(endpoint, payload)` submission made so far, in order.
    pub fn submissions(&self) -> Vec<(&'static str, Payload)> {
        self.submissions.lock().clone()
    }

    /// Number of submissions made so far.
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }
}

impl RemoteTransport for MockTransport {
    fn submit(&self, kind: RecordKind, payload: &Payload) -> SyncResult<String> {
        self.submissions.lock().push((kind.endpoint(), payload.clone()));
        if let Some(outcome) = self.script.lock().pop_front() {
            return outcome;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("remote-{id}"))
    }
}
