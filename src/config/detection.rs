//! Detection tuning: scoring weights, duplicate windows and learning factors.

use serde::{Deserialize, Serialize};

/// Lexical scoring and aggregation knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    /// Minimum similarity ratio for a fuzzy keyword hit (exclusive).
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,
    /// Multiplier applied to every fuzzy contribution.
    #[serde(default = "default_fuzzy_discount")]
    pub fuzzy_discount: f32,
    /// Tokens shorter than this (in characters) never fuzzy-match.
    #[serde(default = "default_min_fuzzy_len")]
    pub min_fuzzy_len: usize,
    /// Share of the averaged keyword score in the final confidence.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
    /// Share of the obfuscation score in the final confidence.
    #[serde(default = "default_obfuscation_weight")]
    pub obfuscation_weight: f32,
    /// Multiplier for the duplicate bonus in the final confidence.
    #[serde(default = "default_duplicate_weight")]
    pub duplicate_weight: f32,
    /// Sensitivity used when the host has no per-chat value.
    #[serde(default = "default_sensitivity")]
    pub default_sensitivity: f32,
    /// Contribution of each distinct phone number.
    #[serde(default = "default_phone_weight")]
    pub phone_weight: f32,
    /// Upper bound on the summed phone contribution.
    #[serde(default = "default_phone_cap")]
    pub phone_cap: f32,
    /// Contribution of each distinct URL or e-mail address.
    #[serde(default = "default_contact_weight")]
    pub contact_weight: f32,
    /// Upper bound on the summed contact contribution.
    #[serde(default = "default_contact_cap")]
    pub contact_cap: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            fuzzy_discount: default_fuzzy_discount(),
            min_fuzzy_len: default_min_fuzzy_len(),
            lexical_weight: default_lexical_weight(),
            obfuscation_weight: default_obfuscation_weight(),
            duplicate_weight: default_duplicate_weight(),
            default_sensitivity: default_sensitivity(),
            phone_weight: default_phone_weight(),
            phone_cap: default_phone_cap(),
            contact_weight: default_contact_weight(),
            contact_cap: default_contact_cap(),
        }
    }
}

fn default_fuzzy_threshold() -> f32 {
    0.75
}

fn default_fuzzy_discount() -> f32 {
    0.9
}

fn default_min_fuzzy_len() -> usize {
    3
}

fn default_lexical_weight() -> f32 {
    0.7
}

fn default_obfuscation_weight() -> f32 {
    0.3
}

fn default_duplicate_weight() -> f32 {
    0.3
}

pub(crate) fn default_sensitivity() -> f32 {
    0.7
}

fn default_phone_weight() -> f32 {
    0.3
}

fn default_phone_cap() -> f32 {
    0.9
}

fn default_contact_weight() -> f32 {
    0.2
}

fn default_contact_cap() -> f32 {
    0.4
}

/// Weights for each structural evasion pattern.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObfuscationConfig {
    /// `.` directly between two letters.
    #[serde(default = "default_dots_weight")]
    pub dots: f32,
    /// Whitespace runs between letters, or letter-by-letter spacing.
    #[serde(default = "default_spaces_weight")]
    pub spaces: f32,
    /// `-` or `_` directly between two letters.
    #[serde(default = "default_dashes_weight")]
    pub dashes: f32,
    /// High density of symbols that are neither letters, digits nor spaces.
    #[serde(default = "default_special_chars_weight")]
    pub special_chars: f32,
    /// Arabic and Latin letters in the same text.
    #[serde(default = "default_mixed_scripts_weight")]
    pub mixed_scripts: f32,
    /// High density of digits.
    #[serde(default = "default_digits_weight")]
    pub digits: f32,
    /// Symbol share above which `special_chars` fires.
    #[serde(default = "default_special_density")]
    pub special_density: f32,
    /// Digit share above which `digits` fires.
    #[serde(default = "default_digit_density")]
    pub digit_density: f32,
    /// Score at or above which a text counts as heavily obfuscated.
    #[serde(default = "default_heavy_threshold")]
    pub heavy_threshold: f32,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            dots: default_dots_weight(),
            spaces: default_spaces_weight(),
            dashes: default_dashes_weight(),
            special_chars: default_special_chars_weight(),
            mixed_scripts: default_mixed_scripts_weight(),
            digits: default_digits_weight(),
            special_density: default_special_density(),
            digit_density: default_digit_density(),
            heavy_threshold: default_heavy_threshold(),
        }
    }
}

fn default_dots_weight() -> f32 {
    0.25
}

fn default_spaces_weight() -> f32 {
    0.25
}

fn default_dashes_weight() -> f32 {
    0.2
}

fn default_special_chars_weight() -> f32 {
    0.15
}

fn default_mixed_scripts_weight() -> f32 {
    0.2
}

fn default_digits_weight() -> f32 {
    0.15
}

fn default_special_density() -> f32 {
    0.15
}

fn default_digit_density() -> f32 {
    0.2
}

fn default_heavy_threshold() -> f32 {
    0.5
}

/// Per-sender repeat detection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DuplicateConfig {
    /// How long a message stays in its sender's window (seconds).
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,
    /// Similarity above which two messages count as repeats (exclusive).
    #[serde(default = "default_repeat_similarity")]
    pub similarity_threshold: f32,
    /// Score returned when a repeat is seen.
    #[serde(default = "default_duplicate_bonus")]
    pub bonus: f32,
    /// Hard cap on retained messages per sender.
    #[serde(default = "default_max_entries")]
    pub max_entries_per_sender: usize,
    /// Tracked sender count above which a warning is logged.
    #[serde(default = "default_max_tracked_senders")]
    pub warn_tracked_senders: usize,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            horizon_secs: default_horizon_secs(),
            similarity_threshold: default_repeat_similarity(),
            bonus: default_duplicate_bonus(),
            max_entries_per_sender: default_max_entries(),
            warn_tracked_senders: default_max_tracked_senders(),
        }
    }
}

fn default_horizon_secs() -> u64 {
    300 // 5 minutes
}

fn default_repeat_similarity() -> f32 {
    0.8
}

fn default_duplicate_bonus() -> f32 {
    0.5
}

fn default_max_entries() -> usize {
    64
}

fn default_max_tracked_senders() -> usize {
    10_000
}

/// Feedback-driven weight adjustment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LearningConfig {
    /// Weight multiplier for terms behind a false positive.
    #[serde(default = "default_decay")]
    pub decay: f32,
    /// Weight multiplier for terms behind a false negative.
    #[serde(default = "default_growth")]
    pub growth: f32,
    /// Weights never drop below this.
    #[serde(default = "default_weight_floor")]
    pub weight_floor: f32,
    /// Characters of the offending message kept in the correction log.
    #[serde(default = "default_sample_prefix")]
    pub sample_prefix_chars: usize,
    /// Log length above which a warning is emitted.
    #[serde(default = "default_log_warn_threshold")]
    pub log_warn_threshold: usize,
    /// Number of terms reported by `learning_stats`.
    #[serde(default = "default_top_terms")]
    pub top_terms: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            decay: default_decay(),
            growth: default_growth(),
            weight_floor: default_weight_floor(),
            sample_prefix_chars: default_sample_prefix(),
            log_warn_threshold: default_log_warn_threshold(),
            top_terms: default_top_terms(),
        }
    }
}

fn default_decay() -> f32 {
    0.95
}

fn default_growth() -> f32 {
    1.05
}

fn default_weight_floor() -> f32 {
    0.05
}

fn default_sample_prefix() -> usize {
    100
}

fn default_log_warn_threshold() -> usize {
    10_000
}

fn default_top_terms() -> usize {
    5
}

/// Extra keyword supplied through configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeywordSpec {
    pub term: String,
    pub weight: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_defaults() {
        let config = DetectionConfig::default();
        assert!((config.fuzzy_threshold - 0.75).abs() < f32::EPSILON);
        assert!((config.fuzzy_discount - 0.9).abs() < f32::EPSILON);
        assert!((config.lexical_weight + config.obfuscation_weight - 1.0).abs() < 1e-6);
        assert!((config.default_sensitivity - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn duplicate_horizon_is_five_minutes() {
        assert_eq!(DuplicateConfig::default().horizon_secs, 300);
    }

    #[test]
    fn learning_factors() {
        let config = LearningConfig::default();
        assert!((config.decay - 0.95).abs() < f32::EPSILON);
        assert!((config.growth - 1.05).abs() < f32::EPSILON);
        assert!(config.weight_floor > 0.0);
    }

    #[test]
    fn obfuscation_weights_in_range() {
        let config = ObfuscationConfig::default();
        for w in [
            config.dots,
            config.spaces,
            config.dashes,
            config.special_chars,
            config.mixed_scripts,
            config.digits,
        ] {
            assert!((0.15..=0.25).contains(&w), "weight {w} out of tuning range");
        }
    }
}
