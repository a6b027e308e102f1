//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("learning.decay must be in (0, 1], got {0}")]
    InvalidDecay(f32),
    #[error("learning.growth must be >= 1, got {0}")]
    InvalidGrowth(f32),
    #[error("learning.weight_floor must be in (0, 1), got {0}")]
    InvalidFloor(f32),
    #[error("duplicate.horizon_secs must be non-zero")]
    ZeroHorizon,
    #[error("keyword {0:?} is empty after normalization or has a weight outside [0, 1]")]
    InvalidKeyword(String),
}

fn check_ratio(errors: &mut Vec<ValidationError>, field: &'static str, value: f32) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: 1.0,
            value,
        });
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let d = &config.detection;
    check_ratio(&mut errors, "detection.fuzzy_threshold", d.fuzzy_threshold);
    check_ratio(&mut errors, "detection.fuzzy_discount", d.fuzzy_discount);
    check_ratio(&mut errors, "detection.lexical_weight", d.lexical_weight);
    check_ratio(&mut errors, "detection.obfuscation_weight", d.obfuscation_weight);
    check_ratio(&mut errors, "detection.duplicate_weight", d.duplicate_weight);
    check_ratio(&mut errors, "detection.phone_weight", d.phone_weight);
    check_ratio(&mut errors, "detection.phone_cap", d.phone_cap);
    check_ratio(&mut errors, "detection.contact_weight", d.contact_weight);
    check_ratio(&mut errors, "detection.contact_cap", d.contact_cap);
    if !(0.1..=1.0).contains(&d.default_sensitivity) {
        errors.push(ValidationError::OutOfRange {
            field: "detection.default_sensitivity",
            min: 0.1,
            max: 1.0,
            value: d.default_sensitivity,
        });
    }

    let o = &config.obfuscation;
    check_ratio(&mut errors, "obfuscation.dots", o.dots);
    check_ratio(&mut errors, "obfuscation.spaces", o.spaces);
    check_ratio(&mut errors, "obfuscation.dashes", o.dashes);
    check_ratio(&mut errors, "obfuscation.special_chars", o.special_chars);
    check_ratio(&mut errors, "obfuscation.mixed_scripts", o.mixed_scripts);
    check_ratio(&mut errors, "obfuscation.digits", o.digits);
    check_ratio(&mut errors, "obfuscation.special_density", o.special_density);
    check_ratio(&mut errors, "obfuscation.digit_density", o.digit_density);
    check_ratio(&mut errors, "obfuscation.heavy_threshold", o.heavy_threshold);

    let dup = &config.duplicate;
    if dup.horizon_secs == 0 {
        errors.push(ValidationError::ZeroHorizon);
    }
    check_ratio(&mut errors, "duplicate.similarity_threshold", dup.similarity_threshold);
    check_ratio(&mut errors, "duplicate.bonus", dup.bonus);

    let l = &config.learning;
    if !(l.decay > 0.0 && l.decay <= 1.0) {
        errors.push(ValidationError::InvalidDecay(l.decay));
    }
    if l.growth < 1.0 {
        errors.push(ValidationError::InvalidGrowth(l.growth));
    }
    if !(l.weight_floor > 0.0 && l.weight_floor < 1.0) {
        errors.push(ValidationError::InvalidFloor(l.weight_floor));
    }

    for extra in config.keywords.iter().chain(&config.username_keywords) {
        let usable = !crate::security::normalize(&extra.term).is_empty()
            && (0.0..=1.0).contains(&extra.weight);
        if !usable {
            errors.push(ValidationError::InvalidKeyword(extra.term.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
