use crate::domain::EventKind;
use crate::reliability::RetryConfig;
use crate::sender::ClientConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-kind capture switches. Each one is independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub errors: bool,
    pub warnings: bool,
    pub information: bool,
    pub exceptions: bool,
    pub csp_violations: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            errors: true,
            warnings: true,
            information: true,
            exceptions: true,
            csp_violations: true,
        }
    }
}

impl CaptureConfig {
    pub fn allows(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Error => self.errors,
            EventKind::Warn => self.warnings,
            EventKind::Log => self.information,
            EventKind::Exception => self.exceptions,
            EventKind::SecurityPolicyViolation => self.csp_violations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    #[serde(with = "super::serde_helpers")]
    pub throttle_window: Duration,
    #[serde(with = "super::serde_helpers")]
    pub report_delay: Duration,
    #[serde(with = "super::serde_helpers")]
    pub cooldown: Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            throttle_window: Duration::from_secs(15),
            report_delay: Duration::from_secs(3),
            cooldown: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub endpoint: String,
    #[serde(with = "super::serde_helpers")]
    pub request_timeout: Duration,
    #[serde(with = "super::serde_helpers")]
    pub connection_timeout: Duration,
    #[serde(with = "super::serde_helpers")]
    pub metadata_timeout: Duration,
    pub enable_compression: bool,
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            endpoint: client.endpoint,
            request_timeout: client.timeout,
            connection_timeout: client.connection_timeout,
            metadata_timeout: Duration::from_secs(2),
            enable_compression: client.enable_compression,
            user_agent: client.user_agent,
        }
    }
}

/// Everything a [`crate::Pipeline`] needs apart from the optional session
/// metadata provider and custom delivery function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub app_name: String,
    pub app_code_name: String,
    /// Location stamped on records whose capture source did not supply one.
    /// Defaults to the running executable as a `file://` URL.
    pub location: Option<String>,
    /// Master switch for the automatic capture adapters (panic hook, console
    /// layer). The explicit capture calls keep working when it is off.
    pub always_on: bool,
    pub capture: CaptureConfig,
    pub scheduling: SchedulingConfig,
    pub delivery: DeliveryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            app_code_name: "rask".to_string(),
            location: None,
            always_on: true,
            capture: CaptureConfig::default(),
            scheduling: SchedulingConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.delivery.endpoint.clone(),
            timeout: self.delivery.request_timeout,
            connection_timeout: self.delivery.connection_timeout,
            user_agent: self.delivery.user_agent.clone(),
            enable_compression: self.delivery.enable_compression,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            cooldown: self.scheduling.cooldown,
        }
    }

    /// Whether an automatic capture adapter for `kind` should be installed.
    pub fn adapter_enabled(&self, kind: EventKind) -> bool {
        self.always_on && self.capture.allows(kind)
    }
}
