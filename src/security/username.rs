//! Username and display-name risk scoring.

use serde::Serialize;
use std::fmt;

use crate::security::keywords::KeywordEntry;
use crate::security::matcher::KeywordMatcher;
use crate::security::normalize;
use crate::security::obfuscation::{ObfuscationScorer, ObfuscationTag};

const LEXICAL_SHARE: f32 = 0.6;
const OBFUSCATION_SHARE: f32 = 0.4;

/// Discrete risk band for a username score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Clear,
    Low,
    Suspicious,
    High,
    Critical,
}

impl RiskTier {
    /// Map a score in `[0, 1]` to its band.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            RiskTier::Critical
        } else if score >= 0.6 {
            RiskTier::High
        } else if score >= 0.4 {
            RiskTier::Suspicious
        } else if score >= 0.2 {
            RiskTier::Low
        } else {
            RiskTier::Clear
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Clear => "clear",
            RiskTier::Low => "low",
            RiskTier::Suspicious => "suspicious",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsernameRisk {
    pub score: f32,
    pub tier: RiskTier,
    pub matched_terms: Vec<String>,
    pub obfuscation_tags: Vec<ObfuscationTag>,
}

impl UsernameRisk {
    fn clear() -> Self {
        Self {
            score: 0.0,
            tier: RiskTier::Clear,
            matched_terms: Vec::new(),
            obfuscation_tags: Vec::new(),
        }
    }
}

/// Scores handles against the username keyword table.
///
/// Handles run words together, so terms are matched as substrings of the
/// compacted name rather than as whole tokens. Phone numbers are not scanned.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernameRiskScorer;

impl UsernameRiskScorer {
    pub fn score(
        &self,
        username: &str,
        entries: &[KeywordEntry],
        matcher: &KeywordMatcher,
        obfuscation: &ObfuscationScorer,
    ) -> UsernameRisk {
        let raw = username.trim().trim_start_matches('@');
        if raw.is_empty() {
            return UsernameRisk::clear();
        }

        let normalized = normalize(raw);
        let outcome = matcher.match_embedded(&normalized, entries);
        let lexical = (outcome.raw_score / outcome.keyword_count().max(1) as f32).clamp(0.0, 1.0);
        let report = obfuscation.score(raw);

        let score = (lexical * LEXICAL_SHARE + report.score * OBFUSCATION_SHARE).clamp(0.0, 1.0);
        UsernameRisk {
            score,
            tier: RiskTier::from_score(score),
            matched_terms: outcome.labels(),
            obfuscation_tags: report.tags,
        }
    }
}
