use thiserror::Error;

/// Top-level error type for building and running the beacon.
///
/// Submitting events never produces one of these; they only surface from
/// construction and process bootstrapping.
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::app::config::ConfigError),

    #[error("No tokio runtime available: {0}")]
    Runtime(String),

    #[error("Delivery client error: {0}")]
    Delivery(#[from] crate::sender::DeliveryError),

    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
