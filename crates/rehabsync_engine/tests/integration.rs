//! Integration tests: executor, scheduler, and store working together.

use parking_lot::Mutex;
use rehabsync_engine::{
    MockTransport, PassOutcome, PassRunner, RemoteTransport, SyncConfig, SyncError, SyncExecutor,
    SyncResult, SyncScheduler,
};
use rehabsync_model::{Payload, RecordKind, SyncStatus, SyncableRecord};
use rehabsync_outbox::{
    JournalBackend, MemoryBackend, OutboxBackend, OutboxError, OutboxResult, OutboxStore,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn record(at: u64, score: i64) -> SyncableRecord {
    let mut payload = Payload::new();
    payload.insert("score".into(), json!(score));
    SyncableRecord::new(RecordKind::ExerciseResult, payload, at)
}

#[test]
fn full_cycle_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.journal");

    let a = record(1, 10);
    let b = record(2, 20);
    let c = record(3, 30);

    // First process: enqueue three, sync with the middle one failing.
    {
        let store = Arc::new(
            OutboxStore::open(Box::new(JournalBackend::open(&path).unwrap())).unwrap(),
        );
        let transport = Arc::new(MockTransport::new());
        transport.push_outcome(Ok("srv-a".into()));
        transport.push_outcome(Err(SyncError::Network("tunnel".into())));
        transport.push_outcome(Ok("srv-c".into()));

        let executor =
            SyncExecutor::new(Arc::clone(&store), transport, SyncConfig::default());

        store.enqueue(a.clone()).unwrap();
        store.enqueue(b.clone()).unwrap();
        store.enqueue(c.clone()).unwrap();

        let report = executor.run_pass().unwrap();
        assert_eq!(report.synced, 2);
        assert_eq!(report.retried, 1);
    }

    // Second process: state and FIFO order survived, only b is queued.
    let store =
        Arc::new(OutboxStore::open(Box::new(JournalBackend::open(&path).unwrap())).unwrap());
    assert_eq!(store.get(a.local_id).unwrap().status, SyncStatus::Synced);
    assert_eq!(store.get(c.local_id).unwrap().status, SyncStatus::Synced);

    let queued = store.pending_and_retrying();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].local_id, b.local_id);
    assert_eq!(queued[0].retry_count, 1);

    // The retry now succeeds; a and c are not re-submitted.
    let transport = Arc::new(MockTransport::new());
    let executor = SyncExecutor::new(
        Arc::clone(&store),
        Arc::clone(&transport),
        SyncConfig::default(),
    );
    let report = executor.run_pass().unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.synced, 1);
    assert_eq!(transport.submission_count(), 1);
    assert_eq!(store.count_pending(), 0);
}

/// Transport that asserts per-record work is never interleaved across
/// concurrent passes and records every submitted score in order.
struct SerializingTransport {
    busy: AtomicBool,
    order: Mutex<Vec<serde_json::Value>>,
}

impl SerializingTransport {
    fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            order: Mutex::new(Vec::new()),
        }
    }
}

impl RemoteTransport for SerializingTransport {
    fn submit(&self, _kind: RecordKind, payload: &Payload) -> SyncResult<String> {
        assert!(
            !self.busy.swap(true, Ordering::SeqCst),
            "per-record work interleaved across passes"
        );
        std::thread::sleep(Duration::from_millis(5));
        self.order.lock().push(payload["score"].clone());
        self.busy.store(false, Ordering::SeqCst);
        Ok(format!("remote-{}", self.order.lock().len()))
    }
}

#[test]
fn concurrent_passes_serialize() {
    let store = Arc::new(OutboxStore::open(Box::new(MemoryBackend::new())).unwrap());
    let transport = Arc::new(SerializingTransport::new());
    let executor = Arc::new(SyncExecutor::new(
        Arc::clone(&store),
        Arc::clone(&transport),
        SyncConfig::default(),
    ));

    for i in 0..4 {
        store.enqueue(record(i, i64::try_from(i).unwrap())).unwrap();
    }

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let executor = Arc::clone(&executor);
            std::thread::spawn(move || executor.run_pass().unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Exactly one pass did the work; later passes saw nothing eligible.
    let order = transport.order.lock().clone();
    assert_eq!(order, vec![json!(0), json!(1), json!(2), json!(3)]);
    assert_eq!(store.count_pending(), 0);
}

/// Backend that starts failing appends after a set number of writes,
/// simulating storage going bad mid-pass.
struct FlakyBackend {
    inner: MemoryBackend,
    appends_left: usize,
}

impl FlakyBackend {
    fn failing_after(appends_left: usize) -> Self {
        Self {
            inner: MemoryBackend::new(),
            appends_left,
        }
    }
}

impl OutboxBackend for FlakyBackend {
    fn load_all(&mut self) -> OutboxResult<Vec<SyncableRecord>> {
        self.inner.load_all()
    }

    fn append(&mut self, record: &SyncableRecord) -> OutboxResult<()> {
        if self.appends_left == 0 {
            return Err(OutboxError::Corrupted("journal device gone".into()));
        }
        self.appends_left -= 1;
        self.inner.append(record)
    }

    fn rewrite(&mut self, records: &[SyncableRecord]) -> OutboxResult<()> {
        self.inner.rewrite(records)
    }
}

#[test]
fn critical_storage_error_aborts_pass_without_losing_commits() {
    // Three enqueues consume three appends; the first mark_synced gets the
    // fourth; the second mark fails.
    let store = Arc::new(OutboxStore::open(Box::new(FlakyBackend::failing_after(4))).unwrap());
    let transport = Arc::new(MockTransport::new());
    let executor = SyncExecutor::new(
        Arc::clone(&store),
        Arc::clone(&transport),
        SyncConfig::default(),
    );

    let a = record(1, 1);
    let b = record(2, 2);
    let c = record(3, 3);
    store.enqueue(a.clone()).unwrap();
    store.enqueue(b.clone()).unwrap();
    store.enqueue(c.clone()).unwrap();

    let result = executor.run_pass();
    assert!(matches!(result, Err(SyncError::Storage(_))));

    // a's commit stands; b is left at its last-committed state; c was
    // never reached.
    assert_eq!(store.get(a.local_id).unwrap().status, SyncStatus::Synced);
    assert_eq!(store.get(b.local_id).unwrap().status, SyncStatus::Pending);
    assert_eq!(store.get(b.local_id).unwrap().retry_count, 0);
    assert_eq!(store.get(c.local_id).unwrap().status, SyncStatus::Pending);
}

#[test]
fn scheduler_drives_executor_end_to_end() {
    let store = Arc::new(OutboxStore::open(Box::new(MemoryBackend::new())).unwrap());
    let transport = Arc::new(MockTransport::new());
    let executor = Arc::new(SyncExecutor::new(
        Arc::clone(&store),
        Arc::clone(&transport),
        SyncConfig::default(),
    ));

    store.enqueue(record(1, 10)).unwrap();
    store.enqueue(record(2, 20)).unwrap();

    let config = SyncConfig::default()
        .with_sync_interval(Duration::from_secs(600))
        .with_debounce(Duration::from_millis(40));
    let scheduler = SyncScheduler::new(config, Arc::clone(&executor) as Arc<dyn PassRunner>);
    scheduler.start();

    // Connectivity comes back in a burst; the debounced pass syncs both.
    for _ in 0..5 {
        scheduler.connectivity_changed(true);
    }
    std::thread::sleep(Duration::from_millis(200));
    scheduler.stop();

    assert_eq!(store.count_pending(), 0);
    assert_eq!(transport.submission_count(), 2);
}

#[test]
fn redundant_manual_pass_is_a_noop() {
    let store = Arc::new(OutboxStore::open(Box::new(MemoryBackend::new())).unwrap());
    let transport = Arc::new(MockTransport::new());
    let executor = Arc::new(SyncExecutor::new(
        Arc::clone(&store),
        Arc::clone(&transport),
        SyncConfig::default(),
    ));

    store.enqueue(record(1, 1)).unwrap();

    let first = executor.try_run_pass().unwrap();
    match first {
        PassOutcome::Completed(report) => assert_eq!(report.synced, 1),
        PassOutcome::AlreadyRunning => panic!("no other pass exists"),
    }

    // A second "sync now" with nothing new does no remote work.
    let second = executor.run_pass().unwrap();
    assert_eq!(second, rehabsync_engine::PassReport::default());
    assert_eq!(transport.submission_count(), 1);
}
