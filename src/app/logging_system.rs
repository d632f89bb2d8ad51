use super::config::{LogFormat, LogLevel};
use crate::domain::BeaconError;
use parking_lot::RwLock;
use std::sync::OnceLock;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Transport crates are chatty at `info`; keep them at `warn`.
const DEFAULT_DIRECTIVES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

/// Builds the beacon's own `tracing` subscriber.
pub struct LoggingSystem {
    directives: RwLock<Vec<Directive>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: RwLock::new(Vec::new()),
        }
    }

    /// Adds a `target=level` directive. Invalid directives are rejected
    /// without touching the ones already added.
    pub fn add_directive(&self, directive: &str) -> Result<(), BeaconError> {
        let parsed = directive.parse::<Directive>().map_err(|e| {
            BeaconError::LoggingInit(format!("Invalid log directive '{directive}': {e}"))
        })?;
        self.directives.write().push(parsed);
        Ok(())
    }

    pub fn add_default_directives(&self) -> Result<(), BeaconError> {
        for directive in DEFAULT_DIRECTIVES {
            self.add_directive(directive)?;
        }
        Ok(())
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        let mut parts = Vec::with_capacity(directives.len() + 1);
        parts.push(default_level.as_str().to_string());
        parts.extend(directives.iter().map(ToString::to_string));
        parts.join(",")
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

    pub fn initialize_tracing(
        &self,
        default_level: LogLevel,
        format: LogFormat,
    ) -> Result<(), BeaconError> {
        let filter_string = self.build_filter_string(default_level);
        let env_filter = EnvFilter::try_new(&filter_string).map_err(|e| {
            BeaconError::LoggingInit(format!("Failed to create EnvFilter with '{filter_string}': {e}"))
        })?;

        let text = (format == LogFormat::Text).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .compact()
        });
        let json = (format == LogFormat::Json).then(|| {
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_target(true)
        });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(text)
            .with(json)
            .try_init()
            .map_err(|e| {
                BeaconError::LoggingInit(format!("Failed to set global tracing subscriber: {e}"))
            })
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global subscriber once. Later calls return the first
/// call's result.
pub fn setup_logging_safe(level: LogLevel, format: LogFormat) -> Result<(), BeaconError> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();

    INIT.get_or_init(|| {
        let logging_system = LoggingSystem::new();
        logging_system
            .add_default_directives()
            .and_then(|()| logging_system.initialize_tracing(level, format))
            .map_err(|e| e.to_string())
    })
    .clone()
    .map_err(BeaconError::LoggingInit)
}
