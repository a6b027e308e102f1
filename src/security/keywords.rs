//! Weighted keyword tables.
//!
//! Terms are stored in normalized form, so an obfuscated spelling added by an
//! operator lands on the same key as its clean spelling. Weight updates take
//! the shard write lock of a single entry; readers see either the old or the
//! new weight, never a partial one.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::security::normalize;
use crate::state::DashMapExt;

/// Version of the built-in tables. Bump when a term or weight changes.
pub const KEYWORD_TABLE_VERSION: u32 = 3;

/// Default message keywords: sick-leave and excuse-note advertising.
const MESSAGE_KEYWORDS: &[(&str, f32)] = &[
    // medical leave
    ("سكليف", 0.95),
    ("سكليفات", 0.95),
    ("اجازة", 0.9),
    ("اجازات", 0.9),
    ("مرضية", 0.9),
    ("مرضي", 0.85),
    ("طبية", 0.45),
    ("طبي", 0.4),
    ("اعذار", 0.9),
    ("اعتذار", 0.85),
    ("عذر", 0.7),
    ("غياب", 0.6),
    ("تقرير", 0.6),
    ("شهادة", 0.6),
    // certification claims
    ("موثق", 0.85),
    ("موثقة", 0.85),
    ("معتمد", 0.85),
    ("معتمدة", 0.85),
    ("موثوق", 0.7),
    ("رسمي", 0.4),
    ("رسمية", 0.4),
    ("حكومي", 0.4),
    ("مستشفى", 0.6),
    ("مستشفيات", 0.6),
    ("صحتي", 0.8),
    ("تطبيق", 0.4),
    // service pitch
    ("نطلع", 0.9),
    ("تطلع", 0.4),
    ("نستقبل", 0.7),
    ("نوفر", 0.5),
    ("خدمة", 0.4),
    ("عرض", 0.4),
    ("فوري", 0.45),
    ("سريع", 0.4),
    ("انجاز", 0.6),
    ("تسليم", 0.4),
    // contact
    ("واتس", 0.9),
    ("واتساب", 0.9),
    ("وتساب", 0.9),
    ("للتواصل", 0.6),
    ("تواصل", 0.4),
    ("اتصل", 0.4),
    ("جوال", 0.4),
    ("رقم", 0.35),
    // phrases
    ("اجازة مرضية", 0.95),
    ("تقرير طبي", 0.95),
    ("شهادة طبية", 0.9),
    ("عذر طبي", 0.95),
];

/// Default username keywords.
const USERNAME_KEYWORDS: &[(&str, f32)] = &[
    ("سكليف", 0.9),
    ("اجازة", 0.9),
    ("اعذار", 0.8),
    ("موثق", 0.8),
    ("معتمد", 0.8),
    ("فوري", 0.7),
    ("سريع", 0.7),
    ("خدمة", 0.6),
    ("عرض", 0.6),
];

/// A normalized term with its weight in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub term: String,
    pub weight: f32,
}

impl KeywordEntry {
    /// Phrase entries only match as whole token sequences.
    pub fn is_phrase(&self) -> bool {
        self.term.contains(' ')
    }
}

/// Concurrent term -> weight map.
#[derive(Debug, Default)]
pub struct KeywordTable {
    entries: DashMap<String, f32>,
}

impl KeywordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in message keywords.
    pub fn message_defaults() -> Self {
        Self::from_pairs(MESSAGE_KEYWORDS)
    }

    /// Built-in username keywords.
    pub fn username_defaults() -> Self {
        Self::from_pairs(USERNAME_KEYWORDS)
    }

    fn from_pairs(pairs: &[(&str, f32)]) -> Self {
        let table = Self::new();
        for (term, weight) in pairs {
            table.merge(term, *weight);
        }
        table
    }

    /// Add `term` unless its normalized form is already present.
    ///
    /// Returns `false` for duplicates and for terms that normalize to nothing.
    pub fn add(&self, term: &str, weight: f32) -> bool {
        let Some(key) = Self::key(term) else {
            return false;
        };
        let weight = clamp_weight(weight);
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(term = %slot.key(), weight, "keyword added");
                slot.insert(weight);
                true
            }
        }
    }

    /// Insert or keep the higher of the existing and the given weight.
    pub fn merge(&self, term: &str, weight: f32) {
        let Some(key) = Self::key(term) else {
            return;
        };
        let weight = clamp_weight(weight);
        self.entries
            .entry(key)
            .and_modify(|w| *w = w.max(weight))
            .or_insert(weight);
    }

    /// Insert or overwrite.
    pub fn set(&self, term: &str, weight: f32) -> bool {
        let Some(key) = Self::key(term) else {
            return false;
        };
        self.entries.insert(key, clamp_weight(weight));
        true
    }

    /// Remove `term`. Absent terms are a no-op returning `false`.
    pub fn remove(&self, term: &str) -> bool {
        let Some(key) = Self::key(term) else {
            return false;
        };
        let removed = self.entries.remove(&key).is_some();
        if removed {
            debug!(term = %key, "keyword removed");
        }
        removed
    }

    pub fn weight(&self, term: &str) -> Option<f32> {
        let key = Self::key(term)?;
        self.entries.get_cloned(&key)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.weight(term).is_some()
    }

    /// Normalized terms, sorted.
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        terms.sort();
        terms
    }

    /// Point-in-time copy of every entry, sorted by term.
    pub fn entries(&self) -> Vec<KeywordEntry> {
        let mut entries: Vec<KeywordEntry> = self
            .entries
            .iter_cloned()
            .into_iter()
            .map(|(term, weight)| KeywordEntry { term, weight })
            .collect();
        entries.sort_by(|a, b| a.term.cmp(&b.term));
        entries
    }

    /// Multiply the weight of `term` by `factor`, keeping it within
    /// `[floor, 1]`. A weight already under the floor is never raised by a
    /// decay. Returns the new weight, or `None` if the term is absent.
    pub fn scale(&self, term: &str, factor: f32, floor: f32) -> Option<f32> {
        let key = Self::key(term)?;
        self.entries.update_with(&key, |weight| {
            let current = *weight;
            let scaled = current * factor;
            *weight = if factor < 1.0 {
                scaled.max(floor.min(current))
            } else {
                scaled.min(1.0)
            };
            *weight
        })
    }

    /// Replace the whole table.
    pub fn replace(&self, entries: &[KeywordEntry]) {
        self.entries.clear();
        for entry in entries {
            self.set(&entry.term, entry.weight);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(term: &str) -> Option<String> {
        let key = normalize(term);
        (!key.is_empty()).then_some(key)
    }
}

fn clamp_weight(weight: f32) -> f32 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_normalized() {
        let table = KeywordTable::message_defaults();
        assert!(table.contains("سكليف"));
        // stored under the folded spelling
        assert!(table.terms().contains(&"اجازه".to_string()));
        assert!(table.terms().contains(&"تقرير طبي".to_string()));
        assert!(table.entries().iter().all(|e| (0.0..=1.0).contains(&e.weight)));
    }

    #[test]
    fn obfuscated_add_hits_clean_key() {
        let table = KeywordTable::new();
        assert!(table.add("س.ك.ل.ي.ف", 0.8));
        assert_eq!(table.weight("سكليف"), Some(0.8));
        // second add of the same normalized term is a no-op
        assert!(!table.add("سكليف", 0.2));
        assert_eq!(table.weight("سكليف"), Some(0.8));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn blank_terms_are_rejected() {
        let table = KeywordTable::new();
        assert!(!table.add("  ", 0.5));
        assert!(!table.remove(""));
        assert!(table.is_empty());
    }

    #[test]
    fn remove_absent_is_noop() {
        let table = KeywordTable::message_defaults();
        let before = table.len();
        assert!(!table.remove("غيرموجود"));
        assert_eq!(table.len(), before);
        assert!(table.remove("سكليف"));
        assert!(!table.contains("سكليف"));
    }

    #[test]
    fn merge_keeps_higher_weight() {
        let table = KeywordTable::new();
        table.merge("عرض", 0.4);
        table.merge("عرض", 0.6);
        table.merge("عرض", 0.5);
        assert_eq!(table.weight("عرض"), Some(0.6));
    }

    #[test]
    fn weights_are_clamped() {
        let table = KeywordTable::new();
        table.add("عرض", 3.0);
        table.add("خدمة", -1.0);
        assert_eq!(table.weight("عرض"), Some(1.0));
        assert_eq!(table.weight("خدمه"), Some(0.0));
    }

    #[test]
    fn scale_respects_floor_and_ceiling() {
        let table = KeywordTable::new();
        table.add("واتس", 0.06);
        let w = table.scale("واتس", 0.5, 0.05).unwrap();
        assert!((w - 0.05).abs() < 1e-6);

        table.add("سكليف", 0.99);
        let w = table.scale("سكليف", 1.05, 0.05).unwrap();
        assert!((w - 1.0).abs() < 1e-6);

        table.add("رقم", 0.01);
        let w = table.scale("رقم", 0.95, 0.05).unwrap();
        assert!(w <= 0.01 + 1e-6);

        assert_eq!(table.scale("غيرموجود", 0.9, 0.05), None);
    }

    #[test]
    fn replace_swaps_contents() {
        let table = KeywordTable::message_defaults();
        table.replace(&[KeywordEntry {
            term: "عرض".to_string(),
            weight: 0.3,
        }]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.weight("عرض"), Some(0.3));
    }

    #[test]
    fn phrase_detection() {
        let entry = KeywordEntry {
            term: "تقرير طبي".to_string(),
            weight: 0.9,
        };
        assert!(entry.is_phrase());
    }
}
