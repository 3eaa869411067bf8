//! Configuration management for budgetfit
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.budgetfit/config.toml

use crate::budget::BudgetConfig;
use crate::errors::{FitError, Result};
use crate::limiter::LimiterConfig;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Complete configuration for budgetfit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub budget: BudgetConfig,
    pub limiter: LimiterConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parsed log level; `warn` when the level is not recognised
    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::Warn)
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FitError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| FitError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, or fall back to built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".budgetfit").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let ratio = self.budget.free_mem_ratio;
        if !(0.0..1.0).contains(&ratio) {
            return Err(FitError::ConfigError(format!(
                "free_mem_ratio must be in [0, 1), got {}",
                ratio
            )));
        }

        if self.budget.calibration_units < 2 {
            return Err(FitError::ConfigError(
                "calibration_units must be at least 2".to_string(),
            ));
        }

        if !(self.budget.min_time_per_unit > 0.0) {
            return Err(FitError::ConfigError(
                "min_time_per_unit must be positive".to_string(),
            ));
        }

        if !(self.limiter.min_time_limit_secs >= 0.0) || !self.limiter.min_time_limit_secs.is_finite() {
            return Err(FitError::ConfigError(
                "min_time_limit_secs must be a non-negative number".to_string(),
            ));
        }

        if self.limiter.poll_interval_ms == 0 {
            return Err(FitError::ConfigError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(FitError::ConfigError(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| FitError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FitError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| FitError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| FitError::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}
