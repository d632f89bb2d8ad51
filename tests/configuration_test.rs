use rask_log_beacon::app::config::{ConfigError, LogFormat, LogLevel};
use rask_log_beacon::{Config, PipelineConfig};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
#[serial]
fn test_from_args_overrides_defaults() {
    let config = Config::from_args([
        "rask-log-beacon",
        "--endpoint",
        "https://collector.example/api/log-items",
        "--throttle-window-ms",
        "20000",
        "--cooldown-ms",
        "5000",
        "--capture-warnings",
        "false",
        "--log-format",
        "json",
        "--enable-compression",
    ])
    .unwrap();

    assert_eq!(config.log_format, LogFormat::Json);
    let pipeline = config.pipeline_config();
    assert_eq!(pipeline.delivery.endpoint, "https://collector.example/api/log-items");
    assert_eq!(pipeline.scheduling.throttle_window, Duration::from_secs(20));
    assert_eq!(pipeline.scheduling.report_delay, Duration::from_secs(3));
    assert_eq!(pipeline.scheduling.cooldown, Duration::from_secs(5));
    assert!(!pipeline.capture.warnings);
    assert!(pipeline.capture.errors);
    assert!(pipeline.delivery.enable_compression);
}

#[test]
#[serial]
fn test_environment_variables_are_read() {
    // SAFETY: serialized with every other test touching the environment.
    unsafe {
        std::env::set_var("BEACON_ENDPOINT", "http://env-collector:4200/api/log-items");
        std::env::set_var("REPORT_DELAY_MS", "1500");
        std::env::set_var("LOG_LEVEL", "debug");
    }

    let result = Config::from_args(["rask-log-beacon"]);

    unsafe {
        std::env::remove_var("BEACON_ENDPOINT");
        std::env::remove_var("REPORT_DELAY_MS");
        std::env::remove_var("LOG_LEVEL");
    }

    let config = result.unwrap();
    assert_eq!(config.endpoint, "http://env-collector:4200/api/log-items");
    assert_eq!(config.scheduling.report_delay, Duration::from_millis(1500));
    assert_eq!(config.log_level, LogLevel::Debug);
}

#[test]
#[serial]
fn test_invalid_endpoint_is_rejected() {
    let result = Config::from_args(["rask-log-beacon", "--endpoint", "ftp://collector/logs"]);
    assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
}

#[test]
#[serial]
fn test_zero_throttle_window_is_rejected() {
    let result = Config::from_args(["rask-log-beacon", "--throttle-window-ms", "0"]);
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_from_file_uses_defaults_for_missing_keys() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
endpoint = "https://collector.example/api/log-items"
app_name = "storefront"
always_on = false
cooldown_ms = 2500
log_level = "warn"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.app_name, "storefront");
    assert_eq!(config.log_level, LogLevel::Warn);
    assert_eq!(config.throttle_window_ms, 15_000);

    let pipeline = config.pipeline_config();
    assert!(!pipeline.always_on);
    assert_eq!(pipeline.scheduling.cooldown, Duration::from_millis(2500));
    assert!(pipeline.capture.csp_violations);
}

#[test]
#[serial]
fn test_config_file_argument_loads_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "report_delay_ms = 250").unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = Config::from_args(["rask-log-beacon", "--config-file", &path]).unwrap();

    assert_eq!(config.scheduling.report_delay, Duration::from_millis(250));
    assert_eq!(config.config_file.as_deref(), Some(file.path()));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "cooldown_ms = \"soon\"").unwrap();

    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_pipeline_config_round_trips_through_toml() {
    let mut config = PipelineConfig::default();
    config.scheduling.throttle_window = Duration::from_millis(12_345);
    config.capture.information = false;

    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("throttle_window = 12345"));

    let parsed: PipelineConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
