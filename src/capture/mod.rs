//! Adapters that translate host signals into event records.
//!
//! Each adapter is registered on its own and hands records to an
//! [`EventSink`], normally the pipeline. Adapters that wrap a process-wide
//! facility return a guard that restores the original on drop.

pub mod console;
pub mod csp;
pub mod exception;
pub mod panic;

pub use console::{ConsoleCapture, ConsoleCaptureLayer};
pub use csp::{CspReport, CspViolation};
pub use exception::ExceptionInfo;
pub use panic::PanicCapture;

use crate::domain::EventRecord;

/// Receives captured records. Must not block.
pub trait EventSink: Send + Sync {
    fn submit(&self, record: EventRecord);
}

impl<F> EventSink for F
where
    F: Fn(EventRecord) + Send + Sync,
{
    fn submit(&self, record: EventRecord) {
        self(record);
    }
}
