//! Domain layer for rask-log-beacon.
//!
//! Contains the canonical types shared across all modules:
//! - `EventRecord`: one captured occurrence, immutable once queued
//! - `EventKind`: the closed set of record kinds
//! - `BeaconError`: top-level error type

pub mod error;
pub mod event_record;

pub use error::BeaconError;
pub use event_record::{EventKind, EventMessage, EventRecord, SourceLocation};
