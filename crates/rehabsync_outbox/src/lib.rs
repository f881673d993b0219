//! # RehabSync Outbox
//!
//! Durable, ordered outbox store for the RehabSync offline-first engine.
//!
//! This crate provides:
//! - `OutboxStore`, the single owner of all record state transitions
//! - `OutboxBackend` trait for pluggable persistence
//! - `MemoryBackend` for tests and `JournalBackend` for production
//!
//! ## Key Invariants
//!
//! - Every mutation is persisted before the in-memory set changes
//! - Records are never removed while `Pending` or `Retry`
//! - Dequeue order is `(created_at_ms, local_id)` and survives restart
//! - One writer at a time; snapshot reads are concurrent

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod journal;
mod memory;
mod store;

pub use backend::OutboxBackend;
pub use error::{OutboxError, OutboxResult};
pub use journal::JournalBackend;
pub use memory::MemoryBackend;
pub use store::OutboxStore;
