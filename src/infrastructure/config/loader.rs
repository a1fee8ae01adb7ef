use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project directory holding configuration and runs.
pub const PROJECT_DIR: &str = ".specrun";

/// Prefix for environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "SPECRUN_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_task_points: {0}. Must be at least 1")]
    InvalidMaxTaskPoints(u32),

    #[error("Invalid default_points: {0}. Must be between 1 and max_task_points ({1})")]
    InvalidDefaultPoints(u32, u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Storage root cannot be empty")]
    EmptyStorageRoot,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .specrun/config.yaml (project config, created by init)
    /// 3. .specrun/local.yaml (project local overrides, optional)
    /// 4. Environment variables (SPECRUN_* prefix)
    pub fn load() -> Result<Config> {
        Self::load_in(Path::new("."))
    }

    /// Load configuration for the project rooted at `dir`.
    pub fn load_in(dir: &Path) -> Result<Config> {
        let project = dir.join(PROJECT_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project.join("config.yaml")))
            .merge(Yaml::file(project.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let planning = &config.planning;
        if planning.max_task_points == 0 {
            return Err(ConfigError::InvalidMaxTaskPoints(planning.max_task_points));
        }
        if planning.default_points == 0 || planning.default_points > planning.max_task_points {
            return Err(ConfigError::InvalidDefaultPoints(
                planning.default_points,
                planning.max_task_points,
            ));
        }

        if config.storage.root.trim().is_empty() {
            return Err(ConfigError::EmptyStorageRoot);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }

    /// Contents written by `specrun init`.
    pub fn default_yaml() -> Result<String> {
        serde_yaml::to_string(&Config::default()).context("Failed to serialize default config")
    }
}
