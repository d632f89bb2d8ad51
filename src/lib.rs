#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Millisecond durations and counters stay far below u64::MAX
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. DeliveryError in sender module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod buffer;
pub mod capture;
pub mod domain;
pub mod reliability;
pub mod scheduler;
pub mod sender;

// Re-export main types for easy access
pub use app::{App, Config, FlushOutcome, Pipeline, PipelineBuilder, PipelineConfig};
pub use capture::{CspViolation, ExceptionInfo};
pub use domain::{BeaconError, EventKind, EventMessage, EventRecord, SourceLocation};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
