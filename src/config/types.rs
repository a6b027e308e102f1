//! Top-level configuration and file loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::detection::{
    DetectionConfig, DuplicateConfig, KeywordSpec, LearningConfig, ObfuscationConfig,
};
use super::validation::ValidationError;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Engine configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub obfuscation: ObfuscationConfig,
    #[serde(default)]
    pub duplicate: DuplicateConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    /// Extra message keywords merged over the built-in table.
    #[serde(default)]
    pub keywords: Vec<KeywordSpec>,
    /// Extra username keywords merged over the built-in table.
    #[serde(default)]
    pub username_keywords: Vec<KeywordSpec>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load and validate in one step.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        super::validation::validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}
