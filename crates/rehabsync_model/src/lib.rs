//! # RehabSync Model
//!
//! Syncable record model for the RehabSync offline-first engine.
//!
//! This crate provides:
//! - `SyncableRecord` for locally persisted exercise results and sessions
//! - `SyncStatus` state machine (pending → retry → synced/failed)
//! - `RecordKind` discriminator with per-kind merge declarations
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod record;
mod status;

pub use record::{Payload, RecordKind, SyncableRecord};
pub use status::SyncStatus;
