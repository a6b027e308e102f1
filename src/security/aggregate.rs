//! Confidence aggregation and the spam verdict.

use serde::Serialize;

use crate::config::{Config, default_sensitivity};
use crate::security::keywords::KeywordEntry;
use crate::security::matcher::{KeywordMatcher, MatchOutcome};
use crate::security::obfuscation::{ObfuscationReport, ObfuscationScorer, ObfuscationTag};

/// Lowest accepted sensitivity. Below this everything would need a perfect
/// score to be flagged.
pub const MIN_SENSITIVITY: f32 = 0.1;

/// Verdict for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub is_spam: bool,
    /// In `[0, 1]`.
    pub confidence: f32,
    /// Reported labels: `term`, `term*` (fuzzy), `phone:<digits>`, `contact:<text>`.
    pub matched_terms: Vec<String>,
    pub obfuscation_score: f32,
    pub obfuscation_tags: Vec<ObfuscationTag>,
    /// The sender repeated a recent message.
    pub duplicate: bool,
    pub normalized_text: String,
}

impl DetectionResult {
    /// Verdict for text with nothing in it.
    pub fn clean() -> Self {
        Self {
            is_spam: false,
            confidence: 0.0,
            matched_terms: Vec::new(),
            obfuscation_score: 0.0,
            obfuscation_tags: Vec::new(),
            duplicate: false,
            normalized_text: String::new(),
        }
    }
}

/// Clamp a caller-supplied sensitivity into `[MIN_SENSITIVITY, 1]`.
/// NaN falls back to the default.
pub fn clamp_sensitivity(sensitivity: f32) -> f32 {
    if sensitivity.is_nan() {
        return default_sensitivity();
    }
    sensitivity.clamp(MIN_SENSITIVITY, 1.0)
}

/// Combines lexical, obfuscation and duplicate signals into a confidence and
/// compares it against `1 - sensitivity`.
///
/// Obfuscation and duplicate signals only amplify lexical evidence: without
/// a keyword or phone hit the confidence is 0.
#[derive(Debug, Clone)]
pub struct ConfidenceAggregator {
    matcher: KeywordMatcher,
    obfuscation: ObfuscationScorer,
    lexical_weight: f32,
    obfuscation_weight: f32,
    duplicate_weight: f32,
}

impl ConfidenceAggregator {
    pub fn new(config: &Config) -> Self {
        Self {
            matcher: KeywordMatcher::new(&config.detection),
            obfuscation: ObfuscationScorer::new(config.obfuscation.clone()),
            lexical_weight: config.detection.lexical_weight,
            obfuscation_weight: config.detection.obfuscation_weight,
            duplicate_weight: config.detection.duplicate_weight,
        }
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    pub fn obfuscation(&self) -> &ObfuscationScorer {
        &self.obfuscation
    }

    /// Score one message against a table snapshot.
    pub fn classify(
        &self,
        normalized: &str,
        raw: &str,
        entries: &[KeywordEntry],
        duplicate_score: f32,
        sensitivity: f32,
    ) -> DetectionResult {
        let outcome = self.matcher.match_message(normalized, raw, entries);
        let report = self.obfuscation.score(raw);
        let confidence = self.confidence(&outcome, &report, duplicate_score);
        let threshold = 1.0 - clamp_sensitivity(sensitivity);

        DetectionResult {
            is_spam: confidence > 0.0 && confidence >= threshold,
            confidence,
            matched_terms: outcome.labels(),
            obfuscation_score: report.score,
            obfuscation_tags: report.tags,
            duplicate: duplicate_score > 0.0,
            normalized_text: normalized.to_string(),
        }
    }

    /// `clamp(avg_keyword * lexical + obfuscation * w_o + duplicate * w_d)`,
    /// where `avg_keyword` divides the raw score by the keyword match count.
    fn confidence(&self, outcome: &MatchOutcome, report: &ObfuscationReport, duplicate_score: f32) -> f32 {
        if !outcome.has_evidence() {
            return 0.0;
        }
        let lexical = outcome.raw_score / outcome.keyword_count().max(1) as f32;
        let combined = lexical * self.lexical_weight
            + report.score * self.obfuscation_weight
            + duplicate_score * self.duplicate_weight;
        combined.clamp(0.0, 1.0)
    }
}
