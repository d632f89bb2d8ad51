use super::groups::{CaptureConfig, DeliveryConfig, PipelineConfig, SchedulingConfig};
use super::{ConfigError, LogFormat, LogLevel};
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://localhost:4200/api/log-items";

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Collector endpoint receiving log-item batches
    #[arg(long, env = "BEACON_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Application name reported in batch metadata
    #[arg(long, env = "APP_NAME", default_value = "rask-log-beacon")]
    pub app_name: String,

    /// Application code name reported in batch metadata
    #[arg(long, env = "APP_CODE_NAME", default_value = "rask")]
    pub app_code_name: String,

    /// Location stamped on records that carry none
    #[arg(long, env = "BEACON_LOCATION")]
    pub location: Option<String>,

    /// Install automatic capture adapters (panic hook)
    #[arg(long, env = "ALWAYS_ON", default_value_t = true, action = ArgAction::Set)]
    pub always_on: bool,

    #[arg(long, env = "CAPTURE_ERRORS", default_value_t = true, action = ArgAction::Set)]
    pub capture_errors: bool,

    #[arg(long, env = "CAPTURE_WARNINGS", default_value_t = true, action = ArgAction::Set)]
    pub capture_warnings: bool,

    #[arg(long, env = "CAPTURE_INFORMATION", default_value_t = true, action = ArgAction::Set)]
    pub capture_information: bool,

    #[arg(long, env = "CAPTURE_EXCEPTIONS", default_value_t = true, action = ArgAction::Set)]
    pub capture_exceptions: bool,

    #[arg(long, env = "CAPTURE_CSP_VIOLATIONS", default_value_t = true, action = ArgAction::Set)]
    pub capture_csp_violations: bool,

    /// Minimum spacing between scheduled deliveries in milliseconds
    #[arg(long, env = "THROTTLE_WINDOW_MS", default_value = "15000")]
    pub throttle_window_ms: u64,

    /// Delay between a submission and its flush request in milliseconds
    #[arg(long, env = "REPORT_DELAY_MS", default_value = "3000")]
    pub report_delay_ms: u64,

    /// Pause after a failed delivery in milliseconds
    #[arg(long, env = "COOLDOWN_MS", default_value = "10000")]
    pub cooldown_ms: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "CONNECTION_TIMEOUT_SECS", default_value = "10")]
    pub connection_timeout_secs: u64,

    /// Upper bound on the session metadata lookup in milliseconds
    #[arg(long, env = "METADATA_TIMEOUT_MS", default_value = "2000")]
    pub metadata_timeout_ms: u64,

    /// Gzip request bodies
    #[arg(long, env = "ENABLE_COMPRESSION")]
    pub enable_compression: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub scheduling: SchedulingConfig,

    #[serde(skip)]
    #[arg(skip)]
    pub request_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub connection_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub metadata_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_name: "rask-log-beacon".to_string(),
            app_code_name: "rask".to_string(),
            location: None,
            always_on: true,
            capture_errors: true,
            capture_warnings: true,
            capture_information: true,
            capture_exceptions: true,
            capture_csp_violations: true,
            throttle_window_ms: 15_000,
            report_delay_ms: 3_000,
            cooldown_ms: 10_000,
            request_timeout_secs: 30,
            connection_timeout_secs: 10,
            metadata_timeout_ms: 2_000,
            enable_compression: false,
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            config_file: None,
            scheduling: SchedulingConfig::default(),
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            metadata_timeout: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Parses arguments (and their environment fallbacks). When a config
    /// file is named, its contents replace the parsed values.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        if let Some(path) = config.config_file.clone() {
            let mut from_file = Self::from_file(&path)?;
            from_file.config_file = Some(path);
            return Ok(from_file);
        }
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.scheduling = SchedulingConfig {
            throttle_window: Duration::from_millis(self.throttle_window_ms),
            report_delay: Duration::from_millis(self.report_delay_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
        };
        self.request_timeout = Duration::from_secs(self.request_timeout_secs);
        self.connection_timeout = Duration::from_secs(self.connection_timeout_secs);
        self.metadata_timeout = Duration::from_millis(self.metadata_timeout_ms);
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            app_name: self.app_name.clone(),
            app_code_name: self.app_code_name.clone(),
            location: self.location.clone(),
            always_on: self.always_on,
            capture: CaptureConfig {
                errors: self.capture_errors,
                warnings: self.capture_warnings,
                information: self.capture_information,
                exceptions: self.capture_exceptions,
                csp_violations: self.capture_csp_violations,
            },
            scheduling: self.scheduling.clone(),
            delivery: DeliveryConfig {
                endpoint: self.endpoint.clone(),
                request_timeout: self.request_timeout,
                connection_timeout: self.connection_timeout,
                metadata_timeout: self.metadata_timeout,
                enable_compression: self.enable_compression,
                ..DeliveryConfig::default()
            },
        }
    }
}
