//! Moderator feedback and detection statistics.
//!
//! Corrections nudge keyword weights: terms behind a false positive decay,
//! terms a false negative should have caught grow. Every correction is kept
//! in a log together with a short sample of the message it was about.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::LearningConfig;
use crate::security::keywords::KeywordTable;
use crate::security::normalize;

/// Which way a moderator corrected a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    /// Flagged, but legitimate.
    FalsePositive,
    /// Missed spam.
    FalseNegative,
}

/// One logged correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    /// Unix seconds.
    pub timestamp: i64,
    pub terms: Vec<String>,
    /// Leading characters of the message, if one was supplied.
    pub sample: Option<String>,
}

/// Everything the store remembers. Serialized into engine snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    pub false_positives: Vec<CorrectionRecord>,
    pub false_negatives: Vec<CorrectionRecord>,
    pub detections_by_term: HashMap<String, u64>,
    pub total_detections: u64,
}

/// Aggregate view returned by `learning_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStats {
    pub total_detections: u64,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// `detections / (detections + fp + fn) * 100`, 0 when nothing happened.
    pub accuracy_percent: f32,
    /// Most frequently detected terms, highest count first.
    pub top_terms: Vec<(String, u64)>,
}

#[derive(Debug)]
pub struct LearningStore {
    config: LearningConfig,
    state: RwLock<LearningState>,
}

impl LearningStore {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            state: RwLock::new(LearningState::default()),
        }
    }

    /// Count a spam verdict and the keyword terms behind it.
    pub fn record_detection(&self, terms: &[String]) {
        let mut state = self.state.write();
        state.total_detections += 1;
        for term in terms {
            *state.detections_by_term.entry(term.clone()).or_insert(0) += 1;
        }
    }

    /// Apply a correction to `table` and log it.
    ///
    /// `terms` may be reported labels (`"موثق*"`, `"phone:0500000000"`);
    /// markers are stripped and non-keyword labels ignored. Terms absent
    /// from the table are logged but adjust nothing. Returns the new weight
    /// of every adjusted term.
    pub fn record_correction(
        &self,
        kind: CorrectionKind,
        table: &KeywordTable,
        terms: &[String],
        sample: Option<&str>,
    ) -> Vec<(String, f32)> {
        let terms: Vec<String> = terms.iter().filter_map(|t| keyword_term(t)).collect();
        let factor = match kind {
            CorrectionKind::FalsePositive => self.config.decay,
            CorrectionKind::FalseNegative => self.config.growth,
        };

        let adjusted: Vec<(String, f32)> = terms
            .iter()
            .filter_map(|term| {
                table
                    .scale(term, factor, self.config.weight_floor)
                    .map(|w| (term.clone(), w))
            })
            .collect();

        let record = CorrectionRecord {
            timestamp: Utc::now().timestamp(),
            terms,
            sample: sample.map(|s| s.chars().take(self.config.sample_prefix_chars).collect()),
        };

        let logged = {
            let mut state = self.state.write();
            let log = match kind {
                CorrectionKind::FalsePositive => &mut state.false_positives,
                CorrectionKind::FalseNegative => &mut state.false_negatives,
            };
            log.push(record);
            log.len()
        };

        info!(?kind, adjusted = adjusted.len(), "Applied moderator correction");
        let threshold = self.config.log_warn_threshold;
        if threshold > 0 && logged % threshold == 0 {
            warn!(?kind, entries = logged, "Correction log keeps growing");
        }
        adjusted
    }

    pub fn stats(&self) -> LearningStats {
        let state = self.state.read();
        let fp = state.false_positives.len();
        let fneg = state.false_negatives.len();
        let denominator = state.total_detections + fp as u64 + fneg as u64;
        let accuracy_percent = if denominator == 0 {
            0.0
        } else {
            state.total_detections as f32 / denominator as f32 * 100.0
        };

        let mut top_terms: Vec<(String, u64)> = state
            .detections_by_term
            .iter()
            .map(|(term, count)| (term.clone(), *count))
            .collect();
        top_terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_terms.truncate(self.config.top_terms);

        LearningStats {
            total_detections: state.total_detections,
            false_positives: fp,
            false_negatives: fneg,
            accuracy_percent,
            top_terms,
        }
    }

    /// Copy of the current state.
    pub fn export(&self) -> LearningState {
        self.state.read().clone()
    }

    /// Replace the current state.
    pub fn import(&self, state: LearningState) {
        *self.state.write() = state;
    }
}

/// Table key behind a reported label, or `None` for phone and contact labels.
fn keyword_term(label: &str) -> Option<String> {
    if label.starts_with("phone:") || label.starts_with("contact:") {
        return None;
    }
    let term = normalize(label.trim_end_matches('*'));
    (!term.is_empty()).then_some(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LearningStore {
        LearningStore::new(LearningConfig::default())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_stats() {
        let stats = store().stats();
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.accuracy_percent, 0.0);
        assert!(stats.top_terms.is_empty());
    }

    #[test]
    fn false_positive_decays_weight() {
        let store = store();
        let table = KeywordTable::new();
        table.add("تطبيق", 0.4);
        let adjusted = store.record_correction(
            CorrectionKind::FalsePositive,
            &table,
            &strings(&["تطبيق*"]),
            None,
        );
        assert_eq!(adjusted.len(), 1);
        assert!((table.weight("تطبيق").unwrap() - 0.38).abs() < 1e-6);
        assert_eq!(store.stats().false_positives, 1);
    }

    #[test]
    fn false_negative_grows_weight_up_to_one() {
        let store = store();
        let table = KeywordTable::new();
        table.add("واتس", 0.98);
        store.record_correction(CorrectionKind::FalseNegative, &table, &strings(&["واتس"]), None);
        assert_eq!(table.weight("واتس"), Some(1.0));
        assert_eq!(store.stats().false_negatives, 1);
    }

    #[test]
    fn unknown_terms_are_logged_without_adjusting() {
        let store = store();
        let table = KeywordTable::new();
        let adjusted = store.record_correction(
            CorrectionKind::FalsePositive,
            &table,
            &strings(&["غيرموجود", "phone:0500000000"]),
            Some("text"),
        );
        assert!(adjusted.is_empty());
        let state = store.export();
        assert_eq!(state.false_positives[0].terms, strings(&["غيرموجود"]));
    }

    #[test]
    fn samples_are_truncated() {
        let store = store();
        let long = "ا".repeat(250);
        store.record_correction(CorrectionKind::FalseNegative, &KeywordTable::new(), &[], Some(&long));
        let state = store.export();
        let sample = state.false_negatives[0].sample.as_ref().unwrap();
        assert_eq!(sample.chars().count(), 100);
    }

    #[test]
    fn accuracy_and_top_terms() {
        let store = store();
        for _ in 0..3 {
            store.record_detection(&strings(&["سكليف", "واتس"]));
        }
        store.record_detection(&strings(&["اعذار"]));
        store.record_correction(CorrectionKind::FalsePositive, &KeywordTable::new(), &[], None);

        let stats = store.stats();
        assert_eq!(stats.total_detections, 4);
        assert!((stats.accuracy_percent - 80.0).abs() < 1e-4);
        assert_eq!(
            stats.top_terms,
            vec![
                ("سكليف".to_string(), 3),
                ("واتس".to_string(), 3),
                ("اعذار".to_string(), 1),
            ]
        );
    }

    #[test]
    fn export_import_roundtrip() {
        let store = store();
        store.record_detection(&strings(&["سكليف"]));
        let state = store.export();

        let other = LearningStore::new(LearningConfig::default());
        other.import(state.clone());
        assert_eq!(other.export(), state);
    }
}
