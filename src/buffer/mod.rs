pub mod batch;
pub mod queue;

pub use batch::{Batch, BatchBuilder, EnvironmentAttributes, SessionMetadataProvider};
pub use queue::EventQueue;
