//! # RehabSync Engine
//!
//! Offline-first sync engine for the RehabTrack mobile application.
//!
//! This crate provides:
//! - `SyncExecutor` running serialized sync passes over the outbox
//! - `SyncScheduler` deciding when passes run (periodic, connectivity,
//!   lifecycle, battery)
//! - Conflict resolution strategies (server/client/latest wins, merge)
//! - Deterministic exponential backoff
//! - `RemoteTransport` abstraction over the remote API
//!
//! ## Architecture
//!
//! Domain code enqueues records into the outbox; the scheduler's worker
//! thread turns timers and connectivity events into trigger messages on a
//! coalescing channel; a single pass thread drains triggers and drives the
//! executor. The executor is the only component that mutates record state,
//! and it does so strictly through the outbox store.
//!
//! ## Key Invariants
//!
//! - At most one sync pass runs at a time
//! - One record's failure never blocks or rolls back its siblings
//! - Already-synced records are never re-submitted
//! - Only critical storage errors escape a pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod config;
mod conflict;
mod error;
mod executor;
mod scheduler;
mod transport;

pub use backoff::BackoffPolicy;
pub use config::SyncConfig;
pub use conflict::{ConflictStrategy, RemoteRecord, Resolution, ResolutionAction};
pub use error::{SyncError, SyncResult};
pub use executor::{PassOutcome, PassReport, PassRunner, SyncExecutor};
pub use scheduler::{AlwaysAllow, BatteryMonitor, SyncScheduler, ThresholdMonitor};
pub use transport::{MockTransport, RemoteTransport};
