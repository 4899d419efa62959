//! # Invoice Flow Configuration System
//!
//! Layered configuration for the flow engine: a base YAML file, an optional
//! environment overlay and `INVOICE_FLOW__*` environment variables, merged by
//! the `config` crate and validated before use.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use invoice_flow::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration (environment auto-detected)
//! let manager = ConfigManager::load()?;
//!
//! let targets = &manager.config().flow.conversion_targets;
//! let timeout = manager.config().stages.timeout_for(invoice_flow::Stage::Extraction);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! ```yaml
//! flow:
//!   conversion_targets: [tally, zoho]
//!   validation_ruleset: default
//! stages:
//!   default_timeout_ms: 30000
//!   timeouts_ms:
//!     extraction: 120000
//!   retry:
//!     max_attempts: 3
//! persistence:
//!   backend: postgres
//!   database_url: postgres://localhost/invoice_flow
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use crate::state_machine::Stage;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring invoice-flow.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Pipeline behaviour
    pub flow: FlowSettings,

    /// Stage call timeouts and retry policy
    pub stages: StageConfig,

    /// Integration credentials per target
    pub integration: IntegrationConfig,

    /// Snapshot storage backend
    pub persistence: PersistenceConfig,

    /// Lifecycle event channel
    pub events: EventsConfig,
}

/// Pipeline behaviour settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowSettings {
    /// Targets the conversion and integration stages run for, in order
    pub conversion_targets: Vec<String>,
    pub validation_ruleset: String,
    /// Ask conversion stages not to publish artifacts
    pub dry_run: bool,
    /// User recorded as the report requester
    pub report_user_id: String,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            conversion_targets: system::DEFAULT_CONVERSION_TARGETS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            validation_ruleset: system::DEFAULT_VALIDATION_RULESET.to_string(),
            dry_run: false,
            report_user_id: system::DEFAULT_REPORT_USER_ID.to_string(),
        }
    }
}

/// Per-stage timeouts and the retry policy applied by stage clients
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StageConfig {
    pub default_timeout_ms: u64,
    /// Overrides keyed by stage name (`extraction`, `conversion`, ...)
    pub timeouts_ms: HashMap<String, u64>,
    pub retry: RetryConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: system::DEFAULT_STAGE_TIMEOUT_MS,
            timeouts_ms: HashMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl StageConfig {
    /// Bound applied to a single call of `stage`
    pub fn timeout_for(&self, stage: Stage) -> Duration {
        let millis = self
            .timeouts_ms
            .get(stage.as_str())
            .copied()
            .unwrap_or(self.default_timeout_ms);
        Duration::from_millis(millis)
    }
}

/// Exponential backoff for transient stage failures
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per stage call, 1 disables retrying
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: system::DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_backoff_ms: system::DEFAULT_RETRY_INITIAL_BACKOFF_MS,
            max_backoff_ms: system::DEFAULT_RETRY_MAX_BACKOFF_MS,
            backoff_multiplier: system::DEFAULT_RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Delay before retry number `retry` (1-based), capped at `max_backoff_ms`
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let millis = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }
}

/// Credentials handed to the integration stage per target
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub credentials: HashMap<String, String>,
}

impl IntegrationConfig {
    pub fn credentials_for(&self, target: &str) -> Option<&str> {
        self.credentials.get(target).map(String::as_str)
    }
}

/// Snapshot storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Memory,
            database_url: None,
            max_connections: system::DEFAULT_DATABASE_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: system::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl FlowConfig {
    /// Validate configuration values and relationships
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let targets = &self.flow.conversion_targets;
        if targets.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "flow.conversion_targets",
                "flow configuration",
            ));
        }

        let mut seen = HashSet::new();
        for target in targets {
            if target.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "flow.conversion_targets",
                    target,
                    "target names must not be blank",
                ));
            }
            if !seen.insert(target.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "flow.conversion_targets",
                    target,
                    "target names must be unique",
                ));
            }
        }

        if self.stages.default_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "stages.default_timeout_ms",
                "0",
                "timeout must be greater than 0",
            ));
        }

        for (stage, millis) in &self.stages.timeouts_ms {
            if stage.parse::<Stage>().is_err() {
                return Err(ConfigurationError::invalid_value(
                    "stages.timeouts_ms",
                    stage,
                    "unknown stage name",
                ));
            }
            if *millis == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("stages.timeouts_ms.{stage}"),
                    "0",
                    "timeout must be greater than 0",
                ));
            }
        }

        let retry = &self.stages.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "stages.retry.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }
        if retry.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "stages.retry.backoff_multiplier",
                retry.backoff_multiplier,
                "multiplier must be at least 1.0",
            ));
        }

        if self.persistence.backend == PersistenceBackend::Postgres {
            if self.persistence.database_url.is_none() {
                return Err(ConfigurationError::missing_required_field(
                    "persistence.database_url",
                    "postgres persistence",
                ));
            }
            if self.persistence.max_connections == 0 {
                return Err(ConfigurationError::invalid_value(
                    "persistence.max_connections",
                    "0",
                    "pool size must be greater than 0",
                ));
            }
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FlowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.flow.conversion_targets, vec!["tally", "zoho"]);
        assert_eq!(
            config.stages.timeout_for(Stage::Report),
            Duration::from_millis(30_000)
        );
        assert!(!config.stages.retry.is_enabled());
    }

    #[test]
    fn test_per_stage_timeout_override() {
        let mut config = FlowConfig::default();
        config
            .stages
            .timeouts_ms
            .insert("extraction".to_string(), 120_000);

        assert_eq!(
            config.stages.timeout_for(Stage::Extraction),
            Duration::from_secs(120)
        );
        assert_eq!(
            config.stages.timeout_for(Stage::Mapping),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_rejects_unknown_stage_timeout() {
        let mut config = FlowConfig::default();
        config.stages.timeouts_ms.insert("ocr".to_string(), 10);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_targets() {
        let mut config = FlowConfig::default();
        config.flow.conversion_targets = vec!["tally".to_string(), "tally".to_string()];
        assert!(config.validate().is_err());

        config.flow.conversion_targets.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = FlowConfig::default();
        config.persistence.backend = PersistenceBackend::Postgres;
        assert!(config.validate().is_err());

        config.persistence.database_url = Some("postgres://localhost/flows".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_schedule() {
        let retry = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.backoff_for(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(350));
        assert_eq!(retry.backoff_for(10), Duration::from_millis(350));
    }
}
