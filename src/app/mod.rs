pub mod config;
pub mod ingest;
pub mod logging_system;
pub mod pipeline;
pub mod shutdown;

pub use config::{Config, ConfigError, LogFormat, LogLevel, PipelineConfig};
pub use logging_system::{LoggingSystem, setup_logging_safe};
pub use pipeline::{FlushOutcome, Pipeline, PipelineBuilder, PipelineStats};
pub use shutdown::{ShutdownSignal, wait_for_signal};

use crate::domain::BeaconError;
use tokio::io::BufReader;
use tracing::{error, info, warn};

/// The `rask-log-beacon` process: stdin in, batches out.
pub struct App {
    config: Config,
    pipeline: Pipeline,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, BeaconError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config)
    }

    /// Installs logging and builds the pipeline. Must run inside a tokio
    /// runtime.
    pub fn from_config(config: Config) -> Result<Self, BeaconError> {
        setup_logging_safe(config.log_level, config.log_format)?;

        info!("Starting rask-log-beacon v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "Configuration: endpoint={}, throttle_window_ms={}, report_delay_ms={}, cooldown_ms={}",
            config.endpoint, config.throttle_window_ms, config.report_delay_ms, config.cooldown_ms
        );

        let pipeline = Pipeline::new(config.pipeline_config())?;
        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Forwards stdin until it closes or a shutdown signal arrives, then
    /// stops the pipeline with a final delivery attempt.
    pub async fn run(self) -> Result<(), BeaconError> {
        let _panic_capture = self.pipeline.install_panic_capture();
        let stdin = BufReader::new(tokio::io::stdin());

        info!("rask-log-beacon is reading events from stdin. Press Ctrl+C to stop.");

        tokio::select! {
            result = ingest::forward_lines(stdin, &self.pipeline) => match result {
                Ok(lines) => info!(records = lines, "Input closed"),
                Err(e) => error!("Failed to read input: {}", e),
            },
            signal = wait_for_signal() => info!(signal = ?signal, "Stopping on signal"),
        }

        if let FlushOutcome::Failed(records) = self.pipeline.shutdown().await {
            warn!(records, "Final delivery failed, undelivered records are discarded");
        }

        info!("rask-log-beacon stopped.");
        Ok(())
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub async fn main() -> Result<(), BeaconError> {
    let app = App::from_args(std::env::args_os())?;
    app.run().await
}
