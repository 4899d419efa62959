//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles environment detection,
//! file layering and environment variable overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::FlowConfig;
use crate::constants::system;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded, validated configuration plus the context it was loaded from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: FlowConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::normalize_environment(environment);
        let environment = environment.as_str();
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            targets = ?config.flow.conversion_targets,
            persistence = ?config.persistence.backend,
            retry_attempts = config.stages.retry.max_attempts,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: FlowConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Base file, then `environments/<env>.yaml`, then `INVOICE_FLOW__SECTION__KEY`
    fn load_layers(config_directory: &Path, environment: &str) -> ConfigResult<FlowConfig> {
        let base = config_directory.join(format!("{}.yaml", system::CONFIG_FILE_STEM));
        let overlay = config_directory
            .join("environments")
            .join(format!("{environment}.yaml"));

        let merged = Config::builder()
            .add_source(File::from(base.clone()).format(FileFormat::Yaml).required(false))
            .add_source(
                File::from(overlay)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(system::CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("flow.conversion_targets")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::LoadError {
                source_path: base.display().to_string(),
                error: e.to_string(),
            })?;

        merged
            .try_deserialize::<FlowConfig>()
            .map_err(|e| ConfigurationError::DeserializeError(e.to_string()))
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        let environment = env::var("INVOICE_FLOW_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        Self::normalize_environment(&environment)
    }

    /// Canonical environment name, as used for overlay files and log profiles
    pub fn normalize_environment(environment: &str) -> String {
        environment.trim().to_lowercase()
    }
}
