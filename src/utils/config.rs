//! Configuration management
//!
//! This module handles loading and managing configuration. Every section and
//! field is optional in the TOML file; anything left out takes its default.

use crate::data::ObservedRanges;
use crate::error::Result;
use crate::features::FeatureConfig;
use crate::forecast::ForecastConfig;
use crate::models::GbmParams;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding the persisted model set and metrics
    pub model_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
        }
    }
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
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ObservedRanges,
    pub features: FeatureConfig,
    pub model: GbmParams,
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every section for out-of-range values
    pub fn validate(&self) -> Result<()> {
        self.validation.validate()?;
        self.features.validate()?;
        self.model.validate()?;
        self.training.validate()?;
        self.forecast.validate()
    }
}
