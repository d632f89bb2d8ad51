pub mod metrics;
pub mod retry;

pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use retry::{DeliveryState, RetryConfig, RetryController};
