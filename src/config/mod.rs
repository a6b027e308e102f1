//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level `Config` and file loading
//! - [`detection`]: Scoring, obfuscation, duplicate and learning sections
//! - [`validation`]: Range checks run before the engine is built

mod detection;
mod types;
mod validation;

pub use detection::{
    DetectionConfig, DuplicateConfig, KeywordSpec, LearningConfig, ObfuscationConfig,
};
pub(crate) use detection::default_sensitivity;
pub use types::{Config, ConfigError};
pub use validation::{ValidationError, validate};
