//! Keyword, phrase and contact matching.
//!
//! Tokens of the normalized text are compared against a table snapshot: an
//! exact hit contributes the full weight, a near miss contributes
//! `weight * ratio * fuzzy_discount`. Phone numbers, URLs and e-mail
//! addresses are scanned on the raw text, since normalization may join
//! their characters to neighbouring words.
//!
//! Substring searches (phrases, terms embedded in handles) run through one
//! overlapping Aho-Corasick automaton per call.

use aho_corasick::AhoCorasick;
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

use crate::config::DetectionConfig;
use crate::security::keywords::KeywordEntry;

/// Maximal digit runs. A run is judged whole, so a long order number is
/// never cut into several phone-sized pieces.
const DIGIT_RUN_PATTERN: &str = r"\+?\d+";
/// Saudi mobile numbers in international and local form, as canonical digits.
const NATIONAL_PHONE_PATTERNS: &[&str] = &[r"^966\d{8,9}$", r"^05\d{8}$"];
/// Any other run of 10 to 15 digits.
const GENERIC_PHONE_PATTERN: &str = r"^\d{10,15}$";
/// Arabic definite article. Tokens carrying it get a second fuzzy form without it.
const DEFINITE_ARTICLE: &str = "\u{0627}\u{0644}";
const CONTACT_PATTERNS: &[&str] = &[
    r"(?i)\b(?:https?://|www\.)\S+",
    r"(?i)\b(?:wa\.me|t\.me|chat\.whatsapp\.com)/\S+",
    r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
];

/// Characters of a message considered for duplicate similarity.
pub const SIMILARITY_CHAR_LIMIT: usize = 512;

/// How a term was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    Fuzzy { ratio: f32 },
    Phone,
    Contact,
}

/// One piece of lexical evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct TermMatch {
    /// Table term, phone digits, or contact text.
    pub term: String,
    pub kind: MatchKind,
    pub contribution: f32,
}

impl TermMatch {
    /// Reported form: fuzzy hits carry a `*` suffix, phones and contacts a prefix.
    pub fn label(&self) -> String {
        match self.kind {
            MatchKind::Exact => self.term.clone(),
            MatchKind::Fuzzy { .. } => format!("{}*", self.term),
            MatchKind::Phone => format!("phone:{}", self.term),
            MatchKind::Contact => format!("contact:{}", self.term),
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self.kind, MatchKind::Exact | MatchKind::Fuzzy { .. })
    }
}

/// Everything a text matched, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub matches: Vec<TermMatch>,
    /// Sum of all contributions. Not clamped.
    pub raw_score: f32,
}

impl MatchOutcome {
    fn push(&mut self, m: TermMatch) {
        self.raw_score += m.contribution;
        self.matches.push(m);
    }

    pub fn keyword_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_keyword()).count()
    }

    pub fn phone_count(&self) -> usize {
        self.matches.iter().filter(|m| m.kind == MatchKind::Phone).count()
    }

    /// A keyword or phone hit. Contacts alone are not evidence.
    pub fn has_evidence(&self) -> bool {
        self.matches
            .iter()
            .any(|m| m.is_keyword() || m.kind == MatchKind::Phone)
    }

    pub fn labels(&self) -> Vec<String> {
        self.matches.iter().map(TermMatch::label).collect()
    }

    /// Table terms behind keyword hits, without fuzzy markers.
    pub fn keyword_terms(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter(|m| m.is_keyword())
            .map(|m| m.term.clone())
            .collect()
    }
}

/// Lexical matcher. Patterns are compiled once at construction.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    fuzzy_threshold: f32,
    fuzzy_discount: f32,
    min_fuzzy_len: usize,
    phone_weight: f32,
    phone_cap: f32,
    contact_weight: f32,
    contact_cap: f32,
    digit_runs: Vec<Regex>,
    phone_shapes: Vec<Regex>,
    contact_patterns: Vec<Regex>,
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}

impl KeywordMatcher {
    pub fn new(config: &DetectionConfig) -> Self {
        let phone_sources = NATIONAL_PHONE_PATTERNS
            .iter()
            .chain(std::iter::once(&GENERIC_PHONE_PATTERN));
        Self {
            fuzzy_threshold: config.fuzzy_threshold,
            fuzzy_discount: config.fuzzy_discount,
            min_fuzzy_len: config.min_fuzzy_len,
            phone_weight: config.phone_weight,
            phone_cap: config.phone_cap,
            contact_weight: config.contact_weight,
            contact_cap: config.contact_cap,
            digit_runs: compile_all(std::iter::once(&DIGIT_RUN_PATTERN), "digit run"),
            phone_shapes: compile_all(phone_sources, "phone"),
            contact_patterns: compile_all(CONTACT_PATTERNS.iter(), "contact"),
        }
    }

    /// Match a message: keyword tokens and phrases on `normalized`, phone
    /// numbers and contacts on `raw`.
    pub fn match_message(&self, normalized: &str, raw: &str, entries: &[KeywordEntry]) -> MatchOutcome {
        let mut outcome = self.match_tokens(normalized, entries);
        self.match_phones(raw, &mut outcome);
        self.match_contacts(raw, &mut outcome);
        outcome
    }

    /// Keyword and phrase matching only.
    pub fn match_tokens(&self, normalized: &str, entries: &[KeywordEntry]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let tokens = tokens(normalized);
        let (phrases, words): (Vec<&KeywordEntry>, Vec<&KeywordEntry>) =
            entries.iter().partition(|e| e.is_phrase());

        for token in &tokens {
            if let Some(m) = self.best_word_match(token, &words) {
                outcome.push(m);
            }
        }

        let padded = format!(" {} ", tokens.join(" "));
        let needles: Vec<String> = phrases.iter().map(|p| format!(" {} ", p.term)).collect();
        if let Some(automaton) = term_automaton(&needles) {
            for index in found_patterns(&automaton, &padded) {
                let phrase = phrases[index];
                outcome.push(TermMatch {
                    term: phrase.term.clone(),
                    kind: MatchKind::Exact,
                    contribution: phrase.weight,
                });
            }
        }
        outcome
    }

    /// Substring matching for handles, where words run together
    /// (`"سكليف_فوري"` becomes `"سكليففوري"`). Tokens that embed no term
    /// fall back to fuzzy comparison.
    pub fn match_embedded(&self, normalized: &str, entries: &[KeywordEntry]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let compact = alphanumeric(normalized);
        if compact.is_empty() {
            return outcome;
        }

        let (searchable, needles): (Vec<&KeywordEntry>, Vec<String>) = entries
            .iter()
            .map(|e| (e, alphanumeric(&e.term)))
            .filter(|(_, needle)| !needle.is_empty())
            .unzip();
        let automaton = term_automaton(&needles);

        let mut embedded: HashSet<&str> = HashSet::new();
        if let Some(automaton) = &automaton {
            for index in found_patterns(automaton, &compact) {
                let entry = searchable[index];
                embedded.insert(&entry.term);
                outcome.push(TermMatch {
                    term: entry.term.clone(),
                    kind: MatchKind::Exact,
                    contribution: entry.weight,
                });
            }
        }

        let words: Vec<&KeywordEntry> = entries
            .iter()
            .filter(|e| !e.is_phrase() && !embedded.contains(e.term.as_str()))
            .collect();
        for token in tokens(normalized) {
            // a token holding an embedded hit has already been scored
            if automaton.as_ref().is_some_and(|a| a.is_match(&alphanumeric(token))) {
                continue;
            }
            if let Some(m) = self.fuzzy_match(token, &words) {
                outcome.push(m);
            }
        }
        outcome
    }

    /// Distinct phone numbers in `raw`, as ASCII digit strings.
    pub fn phone_numbers(&self, raw: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut numbers = Vec::new();
        for run in self.digit_runs.iter().flat_map(|re| re.find_iter(raw)) {
            let digits = canonical_digits(run.as_str());
            let phone_shaped = self.phone_shapes.iter().any(|shape| shape.is_match(&digits));
            if phone_shaped && seen.insert(digits.clone()) {
                numbers.push(digits);
            }
        }
        numbers
    }

    fn match_phones(&self, raw: &str, outcome: &mut MatchOutcome) {
        let mut budget = self.phone_cap;
        for digits in self.phone_numbers(raw) {
            let contribution = self.phone_weight.min(budget.max(0.0));
            budget -= contribution;
            outcome.push(TermMatch {
                term: digits,
                kind: MatchKind::Phone,
                contribution,
            });
        }
    }

    fn match_contacts(&self, raw: &str, outcome: &mut MatchOutcome) {
        let mut seen = HashSet::new();
        let mut budget = self.contact_cap;
        for pattern in &self.contact_patterns {
            for m in pattern.find_iter(raw) {
                let text = m.as_str().to_lowercase();
                if !seen.insert(text.clone()) {
                    continue;
                }
                let contribution = self.contact_weight.min(budget.max(0.0));
                budget -= contribution;
                outcome.push(TermMatch {
                    term: text,
                    kind: MatchKind::Contact,
                    contribution,
                });
            }
        }
    }

    fn best_word_match(&self, token: &str, words: &[&KeywordEntry]) -> Option<TermMatch> {
        if let Some(entry) = words.iter().find(|e| e.term == token) {
            return Some(TermMatch {
                term: entry.term.clone(),
                kind: MatchKind::Exact,
                contribution: entry.weight,
            });
        }
        self.fuzzy_match(token, words)
    }

    /// Highest-ratio entry strictly above the threshold. Ties go to the
    /// heavier entry.
    ///
    /// A token starting with the definite article is also compared without
    /// it (`"الموثق"` against `"موثق"`); the better of the two ratios counts.
    fn fuzzy_match(&self, token: &str, words: &[&KeywordEntry]) -> Option<TermMatch> {
        let token_len = token.chars().count();
        if token_len < self.min_fuzzy_len {
            return None;
        }
        let mut forms = vec![(token, token_len)];
        if let Some(stem) = token.strip_prefix(DEFINITE_ARTICLE) {
            let stem_len = stem.chars().count();
            if stem_len >= self.min_fuzzy_len {
                forms.push((stem, stem_len));
            }
        }

        let mut best: Option<(&KeywordEntry, f32)> = None;
        for &entry in words {
            let term_len = entry.term.chars().count();
            let ratio = forms
                .iter()
                .filter(|(_, len)| length_bound(*len, term_len) > self.fuzzy_threshold)
                .map(|(form, _)| similarity(form, &entry.term))
                .fold(0.0, f32::max);
            if ratio <= self.fuzzy_threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((b, r)) => ratio > r || (ratio == r && entry.weight > b.weight),
            };
            if better {
                best = Some((entry, ratio));
            }
        }

        best.map(|(entry, ratio)| TermMatch {
            term: entry.term.clone(),
            kind: MatchKind::Fuzzy { ratio },
            contribution: entry.weight * ratio * self.fuzzy_discount,
        })
    }
}

/// Normalized Levenshtein similarity `1 - distance / max_len`, in `[0, 1]`.
///
/// Two empty strings are identical (1.0); one empty string shares nothing (0.0).
pub fn similarity(a: &str, b: &str) -> f32 {
    strsim::normalized_levenshtein(a, b) as f32
}

/// Similarity of two whole messages, bounded to the first
/// [`SIMILARITY_CHAR_LIMIT`] characters of each.
pub fn message_similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let a: String = a.chars().take(SIMILARITY_CHAR_LIMIT).collect();
    let b: String = b.chars().take(SIMILARITY_CHAR_LIMIT).collect();
    similarity(&a, &b)
}

/// Upper bound of [`similarity`] for strings of `a` and `b` characters.
pub(crate) fn length_bound(a: usize, b: usize) -> f32 {
    match a.max(b) {
        0 => 1.0,
        longest => a.min(b) as f32 / longest as f32,
    }
}

/// Word tokens with surrounding punctuation trimmed.
fn tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| t.chars().any(char::is_alphabetic))
        .collect()
}

fn alphanumeric(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Overlapping automaton over `needles`, or `None` when there is nothing to
/// search for.
fn term_automaton(needles: &[String]) -> Option<AhoCorasick> {
    if needles.is_empty() {
        return None;
    }
    match AhoCorasick::new(needles) {
        Ok(automaton) => Some(automaton),
        Err(err) => {
            warn!(error = ?err, needles = needles.len(), "Failed to build term automaton; substring matching skipped");
            None
        }
    }
}

/// Pattern indices found in `haystack`, overlaps included, each once and in
/// pattern order.
fn found_patterns(automaton: &AhoCorasick, haystack: &str) -> Vec<usize> {
    let mut found: Vec<usize> = automaton
        .find_overlapping_iter(haystack)
        .map(|m| m.pattern().as_usize())
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}

/// ASCII digits of a phone match, with a leading international `00` dropped.
/// Arabic-Indic and extended Arabic-Indic digits are mapped to ASCII.
fn canonical_digits(text: &str) -> String {
    let digits: String = text
        .chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(c),
            '\u{0660}'..='\u{0669}' => char::from_digit(c as u32 - 0x0660, 10),
            '\u{06F0}'..='\u{06F9}' => char::from_digit(c as u32 - 0x06F0, 10),
            _ => None,
        })
        .collect();
    match digits.strip_prefix("00") {
        Some(rest) if rest.len() >= 10 => rest.to_string(),
        _ => digits,
    }
}

fn compile_all<'a>(sources: impl Iterator<Item = &'a &'a str>, kind: &str) -> Vec<Regex> {
    sources
        .filter_map(|source| match Regex::new(source) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(error = %err, pattern = %source, kind, "Failed to compile pattern; skipping it");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::keywords::KeywordTable;

    fn entries() -> Vec<KeywordEntry> {
        KeywordTable::message_defaults().entries()
    }

    #[test]
    fn similarity_edges() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("", "abc"), 0.0);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        // one edit over five characters
        assert!((similarity("طبيهم", "طبيه") - 0.8).abs() < 1e-6);
        assert!((similarity("abcd", "dcba") - similarity("dcba", "abcd")).abs() < 1e-6);
    }

    #[test]
    fn exact_token_hit() {
        let matcher = KeywordMatcher::default();
        let outcome = matcher.match_tokens("عندنا سكليف", &entries());
        assert_eq!(outcome.labels(), vec!["سكليف"]);
        assert!((outcome.raw_score - 0.95).abs() < 1e-6);
        assert_eq!(outcome.keyword_count(), 1);
    }

    #[test]
    fn fuzzy_token_hit_is_discounted_and_marked() {
        let matcher = KeywordMatcher::default();
        let outcome = matcher.match_tokens("الموثق", &entries());
        assert_eq!(outcome.labels(), vec!["موثق*"]);
        // the article-free form equals the term: 0.85 * 1.0 * 0.9
        assert!((outcome.raw_score - 0.765).abs() < 1e-4);
    }

    #[test]
    fn threshold_is_exclusive() {
        let config = DetectionConfig {
            fuzzy_threshold: 0.8,
            ..DetectionConfig::default()
        };
        let matcher = KeywordMatcher::new(&config);
        // ratio is exactly 0.8
        assert!(matcher.match_tokens("طبيهم", &entries()).matches.is_empty());
    }

    #[test]
    fn short_tokens_never_fuzzy_match() {
        let matcher = KeywordMatcher::default();
        let table = vec![KeywordEntry {
            term: "عذر".to_string(),
            weight: 0.7,
        }];
        assert!(matcher.match_tokens("عذ", &table).matches.is_empty());
    }

    #[test]
    fn trailing_punctuation_does_not_block_exact_match() {
        let matcher = KeywordMatcher::default();
        let outcome = matcher.match_tokens("سكليف!! واتس،", &entries());
        assert_eq!(outcome.labels(), vec!["سكليف", "واتس"]);
    }

    #[test]
    fn phrase_matches_whole_sequence_only() {
        let matcher = KeywordMatcher::default();
        let outcome = matcher.match_tokens("عندي تقرير طبي جاهز", &entries());
        assert!(outcome.labels().contains(&"تقرير طبي".to_string()));

        let split = matcher.match_tokens("تقرير عن الطب", &entries());
        assert!(!split.labels().contains(&"تقرير طبي".to_string()));
    }

    #[test]
    fn greeting_matches_nothing() {
        let matcher = KeywordMatcher::default();
        let outcome = matcher.match_message("مرحبا كيفك انت", "مرحبا كيفك انت", &entries());
        assert!(outcome.matches.is_empty());
        assert!(!outcome.has_evidence());
    }

    #[test]
    fn phones_are_distinct_by_digits() {
        let matcher = KeywordMatcher::default();
        let numbers = matcher.phone_numbers("+966541904263 or 00966541904263 or 966541904263");
        assert_eq!(numbers, vec!["966541904263"]);
    }

    #[test]
    fn arabic_indic_digits_are_phones() {
        let matcher = KeywordMatcher::default();
        let numbers = matcher.phone_numbers("٠٥٤١٩٠٤٢٦٣");
        assert_eq!(numbers, vec!["0541904263"]);
    }

    #[test]
    fn phone_contribution_is_capped() {
        let matcher = KeywordMatcher::default();
        let raw = "0500000001 0500000002 0500000003 0500000004 0500000005";
        let outcome = matcher.match_message("", raw, &[]);
        assert_eq!(outcome.phone_count(), 5);
        assert!((outcome.raw_score - 0.9).abs() < 1e-5);
        assert!(outcome.has_evidence());
        assert_eq!(outcome.keyword_count(), 0);
        assert!(outcome.labels()[0].starts_with("phone:"));
    }

    #[test]
    fn contacts_score_but_are_not_evidence() {
        let matcher = KeywordMatcher::default();
        let raw = "see https://example.com and mail me@example.com";
        let outcome = matcher.match_message("", raw, &[]);
        assert_eq!(outcome.matches.len(), 2);
        assert!((outcome.raw_score - 0.4).abs() < 1e-6);
        assert!(!outcome.has_evidence());
    }

    #[test]
    fn embedded_terms_in_handles() {
        let matcher = KeywordMatcher::default();
        let table = KeywordTable::username_defaults().entries();
        let outcome = matcher.match_embedded("سكليففوري", &table);
        let mut labels = outcome.labels();
        labels.sort();
        assert_eq!(labels, vec!["سكليف", "فوري"]);

        assert!(matcher.match_embedded("ahmed", &table).matches.is_empty());
    }

    #[test]
    fn one_edit_in_a_short_word_is_not_enough() {
        let matcher = KeywordMatcher::default();
        // 1 - 1/4 is not above 0.75
        assert!(matcher.match_tokens("كيفك", &entries()).matches.is_empty());
    }

    #[test]
    fn digit_runs_are_judged_whole() {
        let matcher = KeywordMatcher::default();
        assert!(matcher.phone_numbers("123456789").is_empty());
        assert!(matcher.phone_numbers("1234567890123456").is_empty());
        assert!(matcher.phone_numbers("123456789012345678901234567890").is_empty());
        assert_eq!(matcher.phone_numbers("order 123456789012345"), vec!["123456789012345"]);
        assert_eq!(matcher.phone_numbers("ref 96654190426312345678"), Vec::<String>::new());
    }

    #[test]
    fn long_order_number_is_not_evidence() {
        let matcher = KeywordMatcher::default();
        let raw = "رقم الطلب 123456789012345678901234567890";
        let outcome = matcher.match_message(raw, raw, &entries());
        assert_eq!(outcome.phone_count(), 0);
        assert_eq!(outcome.labels(), vec!["رقم"]);
    }

    #[test]
    fn overlapping_terms_in_handles_all_count() {
        let matcher = KeywordMatcher::default();
        let table = vec![
            KeywordEntry { term: "واتس".to_string(), weight: 0.8 },
            KeywordEntry { term: "واتساب".to_string(), weight: 0.9 },
            KeywordEntry { term: "ساب".to_string(), weight: 0.1 },
        ];
        let outcome = matcher.match_embedded("واتسابواتساب", &table);
        assert_eq!(outcome.labels(), vec!["واتس", "واتساب", "ساب"]);
    }

    #[test]
    fn overlapping_phrases_all_count() {
        let matcher = KeywordMatcher::default();
        let outcome = matcher.match_tokens("عذر طبي معتمد", &entries());
        let labels = outcome.labels();
        assert!(labels.contains(&"عذر طبي".to_string()));
        assert!(labels.contains(&"عذر".to_string()));
        assert!(labels.contains(&"طبي".to_string()));
    }

    #[test]
    fn length_bound_limits_similarity() {
        assert_eq!(length_bound(0, 0), 1.0);
        assert_eq!(length_bound(4, 5), 0.8);
        assert!(similarity("abcd", "wxyz0") <= length_bound(4, 5));
    }

    #[test]
    fn canonical_digit_forms() {
        assert_eq!(canonical_digits("+966 54"), "96654");
        assert_eq!(canonical_digits("00966541904263"), "966541904263");
        assert_eq!(canonical_digits("۰۵۴"), "054");
    }
}
