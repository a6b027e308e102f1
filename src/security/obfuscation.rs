//! Structural evasion scoring on raw (pre-normalization) text.
//!
//! Each evidence category adds its configured weight once when present.
//! Contributions are summed and clamped to 1.0, so stacking techniques raises
//! the score monotonically while no single pattern can saturate it.

use serde::Serialize;
use std::fmt;

use crate::config::ObfuscationConfig;
use crate::security::normalize::{is_arabic_letter, is_stripped_mark};

/// Named evidence category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObfuscationTag {
    /// `.` directly between two letters.
    Dots,
    /// Whitespace runs of 2+ between letters, or letter-by-letter spacing.
    Spaces,
    /// `-` or `_` directly between two letters.
    Dashes,
    /// Symbol density above the configured share.
    SpecialChars,
    /// Arabic and Latin letters in the same text.
    MixedScripts,
    /// Digit density above the configured share.
    Digits,
}

impl ObfuscationTag {
    pub fn name(&self) -> &'static str {
        match self {
            ObfuscationTag::Dots => "dots",
            ObfuscationTag::Spaces => "spaces",
            ObfuscationTag::Dashes => "dashes",
            ObfuscationTag::SpecialChars => "special_chars",
            ObfuscationTag::MixedScripts => "mixed_scripts",
            ObfuscationTag::Digits => "digits",
        }
    }
}

impl fmt::Display for ObfuscationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Obfuscation score with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObfuscationReport {
    /// Clamped to `[0, 1]`.
    pub score: f32,
    pub tags: Vec<ObfuscationTag>,
    /// Score reached the heavy-obfuscation threshold.
    pub heavy: bool,
}

impl ObfuscationReport {
    fn empty() -> Self {
        Self {
            score: 0.0,
            tags: Vec::new(),
            heavy: false,
        }
    }

    pub fn has(&self, tag: ObfuscationTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Scores raw text for structural evidence of evasion.
#[derive(Debug, Clone)]
pub struct ObfuscationScorer {
    config: ObfuscationConfig,
}

impl Default for ObfuscationScorer {
    fn default() -> Self {
        Self::new(ObfuscationConfig::default())
    }
}

impl ObfuscationScorer {
    pub fn new(config: ObfuscationConfig) -> Self {
        Self { config }
    }

    /// Score `raw` and collect the evidence tags that fired.
    pub fn score(&self, raw: &str) -> ObfuscationReport {
        let chars: Vec<char> = raw.chars().collect();
        if chars.is_empty() {
            return ObfuscationReport::empty();
        }

        let mut tags = Vec::new();
        let mut score = 0.0f32;
        let mut add = |tag: ObfuscationTag, weight: f32| {
            tags.push(tag);
            score += weight;
        };

        if has_flanked(&chars, |c| matches!(c, '.' | '\u{00B7}' | '\u{2022}')) {
            add(ObfuscationTag::Dots, self.config.dots);
        }
        if has_spaced_letters(&chars, raw) {
            add(ObfuscationTag::Spaces, self.config.spaces);
        }
        if has_flanked(&chars, |c| matches!(c, '-' | '_' | '\u{2010}')) {
            add(ObfuscationTag::Dashes, self.config.dashes);
        }

        let len = chars.len() as f32;
        let special = chars
            .iter()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !is_stripped_mark(**c))
            .count();
        if special as f32 > len * self.config.special_density {
            add(ObfuscationTag::SpecialChars, self.config.special_chars);
        }

        let arabic = chars.iter().any(|c| is_arabic_letter(*c));
        let latin = chars.iter().any(|c| c.is_ascii_alphabetic());
        if arabic && latin {
            add(ObfuscationTag::MixedScripts, self.config.mixed_scripts);
        }

        let digits = chars.iter().filter(|c| c.is_numeric()).count();
        if digits as f32 > len * self.config.digit_density {
            add(ObfuscationTag::Digits, self.config.digits);
        }

        let score = score.clamp(0.0, 1.0);
        ObfuscationReport {
            score,
            tags,
            heavy: score >= self.config.heavy_threshold,
        }
    }
}

/// Some char matching `pred` sits directly between two letters.
fn has_flanked(chars: &[char], pred: impl Fn(char) -> bool) -> bool {
    chars
        .windows(3)
        .any(|w| pred(w[1]) && w[0].is_alphabetic() && w[2].is_alphabetic())
}

/// A whitespace run of 2+ between letters, or 3+ single-letter words in a row.
fn has_spaced_letters(chars: &[char], raw: &str) -> bool {
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let flanked = start > 0 && i < chars.len() && chars[start - 1].is_alphabetic() && chars[i].is_alphabetic();
        if flanked && i - start >= 2 {
            return true;
        }
    }

    let mut run = 0;
    for token in raw.split_whitespace() {
        let mut it = token.chars();
        let single = matches!((it.next(), it.next()), (Some(c), None) if c.is_alphabetic());
        run = if single { run + 1 } else { 0 };
        if run >= 3 {
            return true;
        }
    }
    false
}
