//! The sync scheduler: decides when passes run.

use crate::config::SyncConfig;
use crate::executor::{PassOutcome, PassRunner};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Battery-aware gate consulted before every pass.
pub trait BatteryMonitor: Send + Sync {
    /// Returns false when sync should be suppressed to save battery.
    fn should_sync(&self) -> bool;
}

/// A monitor that never suppresses sync.
#[derive(Debug, Default)]
pub struct AlwaysAllow;

impl BatteryMonitor for AlwaysAllow {
    fn should_sync(&self) -> bool {
        true
    }
}

/// Suppresses sync while battery optimization is enabled and the device
/// reports low battery. Both inputs are fed by platform glue.
#[derive(Debug, Default)]
pub struct ThresholdMonitor {
    optimization_enabled: AtomicBool,
    low_battery: AtomicBool,
}

impl ThresholdMonitor {
    /// Creates a monitor with optimization disabled and battery ok.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables battery optimization.
    pub fn set_optimization_enabled(&self, enabled: bool) {
        self.optimization_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Updates the low-battery reading.
    pub fn set_low_battery(&self, low: bool) {
        self.low_battery.store(low, Ordering::SeqCst);
    }
}

impl BatteryMonitor for ThresholdMonitor {
    fn should_sync(&self) -> bool {
        !(self.optimization_enabled.load(Ordering::SeqCst)
            && self.low_battery.load(Ordering::SeqCst))
    }
}

enum Command {
    SyncNow,
    Connectivity(bool),
    Foreground,
    Background,
    RetryAfter(Duration),
    Shutdown,
}

struct Running {
    tx: mpsc::Sender<Command>,
    worker: JoinHandle<()>,
    pass_thread: JoinHandle<()>,
}

/// Background scheduler driving the executor.
///
/// A worker thread turns triggers into deadlines: a periodic timer (active
/// while foregrounded), a debounced connectivity-regained timer, a one-shot
/// retry deadline armed from each pass report's soonest backoff wait, and
/// manual "sync now" requests. Due deadlines become messages on a capacity-one
/// trigger channel drained by a dedicated pass thread, so a stalled remote
/// call never wedges the timers and stacked triggers coalesce into one
/// pass. The pass thread consults the battery gate before every pass.
pub struct SyncScheduler {
    config: SyncConfig,
    runner: Arc<dyn PassRunner>,
    battery: Arc<dyn BatteryMonitor>,
    running: Mutex<Option<Running>>,
}

impl SyncScheduler {
    /// Creates a scheduler that never suppresses passes for battery.
    pub fn new(config: SyncConfig, runner: Arc<dyn PassRunner>) -> Self {
        Self::with_battery_monitor(config, runner, Arc::new(AlwaysAllow))
    }

    /// Creates a scheduler with a battery gate.
    pub fn with_battery_monitor(
        config: SyncConfig,
        runner: Arc<dyn PassRunner>,
        battery: Arc<dyn BatteryMonitor>,
    ) -> Self {
        Self {
            config,
            runner,
            battery,
            running: Mutex::new(None),
        }
    }

    /// Starts the worker and pass threads. Idempotent.
    ///
    /// The app is assumed foregrounded at start; the periodic timer is
    /// armed immediately.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            debug!("scheduler already started");
            return;
        }

        let (tx, rx) = mpsc::channel::<Command>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let pass_thread = {
            let runner = Arc::clone(&self.runner);
            let battery = Arc::clone(&self.battery);
            let battery_aware = self.config.battery_aware;
            let command_tx = tx.clone();
            std::thread::spawn(move || {
                pass_loop(&trigger_rx, &command_tx, &*runner, &*battery, battery_aware);
            })
        };

        let worker = {
            let interval = self.config.sync_interval;
            let debounce = self.config.debounce;
            std::thread::spawn(move || worker_loop(&rx, &trigger_tx, interval, debounce))
        };

        info!("scheduler started");
        *running = Some(Running {
            tx,
            worker,
            pass_thread,
        });
    }

    /// Stops the worker, cancelling any armed debounce deadline so no stale
    /// trigger fires after shutdown. Idempotent.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            debug!("scheduler already stopped");
            return;
        };

        let _ = running.tx.send(Command::Shutdown);
        let _ = running.worker.join();
        let _ = running.pass_thread.join();
        info!("scheduler stopped");
    }

    /// Returns true if the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Requests an immediate pass, bypassing debounce. Still battery-gated
    /// and serialized by the executor.
    pub fn sync_now(&self) {
        self.send(Command::SyncNow);
    }

    /// Feeds a connectivity transition from the platform.
    pub fn connectivity_changed(&self, connected: bool) {
        self.send(Command::Connectivity(connected));
    }

    /// Resumes the periodic timer after the app returns to the foreground.
    pub fn app_foregrounded(&self) {
        self.send(Command::Foreground);
    }

    /// Suspends the periodic timer while the app is backgrounded.
    pub fn app_backgrounded(&self) {
        self.send(Command::Background);
    }

    fn send(&self, command: Command) {
        if let Some(running) = self.running.lock().as_ref() {
            let _ = running.tx.send(command);
        } else {
            debug!("scheduler not running, trigger dropped");
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Timer loop: owns all deadlines, converts them into trigger messages.
fn worker_loop(
    rx: &Receiver<Command>,
    trigger_tx: &SyncSender<()>,
    interval: Duration,
    debounce: Duration,
) {
    let mut next_periodic = Some(Instant::now() + interval);
    let mut debounce_deadline: Option<Instant> = None;
    let mut retry_deadline: Option<Instant> = None;
    let mut connected: Option<bool> = None;

    loop {
        let now = Instant::now();

        if debounce_deadline.is_some_and(|d| d <= now) {
            debounce_deadline = None;
            debug!("debounce window elapsed");
            trigger(trigger_tx);
        }
        if retry_deadline.is_some_and(|d| d <= now) {
            retry_deadline = None;
            debug!("retry backoff elapsed");
            trigger(trigger_tx);
        }
        if let Some(due) = next_periodic {
            if due <= now {
                next_periodic = Some(now + interval);
                debug!("periodic timer fired");
                trigger(trigger_tx);
            }
        }

        let deadline = [debounce_deadline, retry_deadline, next_periodic]
            .into_iter()
            .flatten()
            .min();

        let command = match deadline {
            Some(due) => {
                match rx.recv_timeout(due.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => return,
            },
        };

        match command {
            Command::SyncNow => trigger(trigger_tx),
            Command::Connectivity(true) => {
                if connected != Some(true) && debounce_deadline.is_none() {
                    debug!("connectivity regained, debouncing");
                    debounce_deadline = Some(Instant::now() + debounce);
                }
                connected = Some(true);
            }
            Command::Connectivity(false) => {
                connected = Some(false);
                // No point retrying while offline either.
                debounce_deadline = None;
                retry_deadline = None;
            }
            Command::Foreground => {
                if next_periodic.is_none() {
                    debug!("foregrounded, periodic timer resumed");
                    next_periodic = Some(Instant::now() + interval);
                }
            }
            Command::RetryAfter(delay) => {
                let due = Instant::now() + delay;
                // Keep the soonest outstanding retry.
                retry_deadline = Some(retry_deadline.map_or(due, |d| d.min(due)));
            }
            Command::Background => {
                debug!("backgrounded, periodic timer suspended");
                next_periodic = None;
            }
            Command::Shutdown => return,
        }
    }
}

/// Pass loop: drains coalesced triggers, drives the executor, and feeds
/// each pass's soonest backoff wait back to the worker as a retry deadline.
fn pass_loop(
    trigger_rx: &Receiver<()>,
    command_tx: &mpsc::Sender<Command>,
    runner: &dyn PassRunner,
    battery: &dyn BatteryMonitor,
    battery_aware: bool,
) {
    while trigger_rx.recv().is_ok() {
        if battery_aware && !battery.should_sync() {
            debug!("pass suppressed by battery gate");
            continue;
        }
        match runner.try_run_pass() {
            Ok(PassOutcome::Completed(report)) => {
                debug!(synced = report.synced, retried = report.retried, "triggered pass done");
                if let Some(delay) = report.next_retry_delay {
                    let _ = command_tx.send(Command::RetryAfter(delay));
                }
            }
            Ok(PassOutcome::AlreadyRunning) => debug!("pass already in flight, coalesced"),
            Err(e) => error!(error = %e, "sync pass aborted"),
        }
    }
}

/// Posts a trigger; a full channel means a pass is already queued.
fn trigger(trigger_tx: &SyncSender<()>) {
    match trigger_tx.try_send(()) {
        Ok(()) | Err(TrySendError::Full(())) => {}
        Err(TrySendError::Disconnected(())) => debug!("pass thread gone, trigger dropped"),
    }
}
