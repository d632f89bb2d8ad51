use super::{Config, ConfigError, PipelineConfig};
use url::Url;

fn validate_http_url(label: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {label} URL '{value}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidUrl(format!(
            "Unsupported {label} URL scheme '{scheme}' in '{value}'"
        ))),
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("endpoint", &self.delivery.endpoint)?;
        self.validate_settings()
    }

    /// Everything except the endpoint, for pipelines that deliver through an
    /// injected transport.
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        if let Some(location) = &self.location {
            Url::parse(location).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid location '{location}': {e}"))
            })?;
        }

        if self.scheduling.throttle_window.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Throttle window must be greater than 0".to_string(),
            ));
        }

        if self.scheduling.cooldown.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Cooldown must be greater than 0".to_string(),
            ));
        }

        if self.delivery.request_timeout.is_zero()
            || self.delivery.connection_timeout.is_zero()
            || self.delivery.metadata_timeout.is_zero()
        {
            return Err(ConfigError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline_config().validate()
    }
}
