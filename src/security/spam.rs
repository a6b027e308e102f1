//! Spam Detection Service
//!
//! Obfuscation-aware advertisement detection for chat messages and handles.
//!
//! Detection layers:
//! 1. **Normalization**: dotted, dashed, spaced and lookalike spellings fold
//!    onto one canonical form
//! 2. **Keyword matching**: weighted exact, fuzzy and phrase hits plus phone
//!    and contact patterns
//! 3. **Obfuscation scoring**: structural evidence of evasion on the raw text
//! 4. **Duplicate detection**: near copies from the same sender
//! 5. **Feedback**: moderator corrections nudge keyword weights
//!
//! # Design Principles
//! - **Low false positives**: obfuscation and repetition only amplify lexical
//!   evidence, they never flag a message on their own
//! - **Shared by reference**: every operation takes `&self`; tables and
//!   windows use sharded locks
//! - **Infallible classification**: malformed input yields a clean verdict

use dashmap::DashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SnapshotError;
use crate::security::aggregate::{ConfidenceAggregator, DetectionResult, clamp_sensitivity};
use crate::security::duplicate::DuplicateSignal;
use crate::security::keywords::{KEYWORD_TABLE_VERSION, KeywordEntry, KeywordTable};
use crate::security::learning::{CorrectionKind, LearningStats, LearningStore};
use crate::security::normalize::{NORMALIZATION_VERSION, normalize};
use crate::security::obfuscation::ObfuscationReport;
use crate::security::snapshot::{EngineSnapshot, SNAPSHOT_VERSION};
use crate::security::username::{UsernameRisk, UsernameRiskScorer};
use crate::{ChatId, UserId};

/// Centralized Spam Detection Service
///
/// Built once from a [`Config`] and shared between message handlers.
pub struct SpamDetectionService {
    aggregator: ConfidenceAggregator,
    /// Global message keywords, including learned weights.
    keywords: KeywordTable,
    /// Per-chat additions, matched together with the global table.
    chat_keywords: DashMap<ChatId, KeywordTable>,
    username_keywords: KeywordTable,
    username_scorer: UsernameRiskScorer,
    duplicates: DuplicateSignal,
    learning: LearningStore,
    default_sensitivity: f32,
}

impl Default for SpamDetectionService {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl SpamDetectionService {
    /// Create the service with the built-in tables plus any configured terms.
    pub fn new(config: Config) -> Self {
        let keywords = KeywordTable::message_defaults();
        for extra in &config.keywords {
            if !keywords.set(&extra.term, extra.weight) {
                warn!(term = %extra.term, "Configured keyword normalizes to nothing; skipped");
            }
        }
        let username_keywords = KeywordTable::username_defaults();
        for extra in &config.username_keywords {
            if !username_keywords.set(&extra.term, extra.weight) {
                warn!(term = %extra.term, "Configured username keyword normalizes to nothing; skipped");
            }
        }

        info!(
            keywords = keywords.len(),
            username_keywords = username_keywords.len(),
            table_version = KEYWORD_TABLE_VERSION,
            normalization_version = NORMALIZATION_VERSION,
            "Spam detection service ready"
        );

        Self {
            aggregator: ConfidenceAggregator::new(&config),
            keywords,
            chat_keywords: DashMap::new(),
            username_keywords,
            username_scorer: UsernameRiskScorer,
            duplicates: DuplicateSignal::new(config.duplicate),
            learning: LearningStore::new(config.learning),
            default_sensitivity: config.detection.default_sensitivity,
        }
    }

    /// Sensitivity used when the host has no per-chat value.
    pub fn default_sensitivity(&self) -> f32 {
        self.default_sensitivity
    }

    /// Canonical form of `text`, as used for matching.
    pub fn normalize(&self, text: &str) -> String {
        normalize(text)
    }

    /// Classify a chat message.
    ///
    /// # Arguments
    /// * `text` - Raw message text
    /// * `chat_id`, `user_id` - Sender identity for duplicate tracking and
    ///   per-chat keywords
    /// * `sensitivity` - Clamped to `[0.1, 1.0]`; the message is spam when
    ///   confidence reaches `1 - sensitivity`
    pub fn classify_message(&self, text: &str, chat_id: ChatId, user_id: UserId, sensitivity: f32) -> DetectionResult {
        self.classify_message_at(text, chat_id, user_id, sensitivity, Instant::now())
    }

    /// [`classify_message`](Self::classify_message) with an explicit clock.
    pub fn classify_message_at(
        &self,
        text: &str,
        chat_id: ChatId,
        user_id: UserId,
        sensitivity: f32,
        now: Instant,
    ) -> DetectionResult {
        let sensitivity = clamp_sensitivity(sensitivity);
        let normalized = normalize(text);
        if normalized.is_empty() {
            return DetectionResult::clean();
        }

        let duplicate_score = self.duplicates.observe(chat_id, user_id, &normalized, now);
        let entries = self.entries_for(chat_id);
        let result = self
            .aggregator
            .classify(&normalized, text, &entries, duplicate_score, sensitivity);

        if result.is_spam {
            let terms: Vec<String> = result
                .matched_terms
                .iter()
                .filter(|t| !t.starts_with("phone:") && !t.starts_with("contact:"))
                .map(|t| t.trim_end_matches('*').to_string())
                .collect();
            self.learning.record_detection(&terms);
            debug!(
                chat_id,
                user_id,
                confidence = result.confidence,
                terms = ?result.matched_terms,
                obfuscation = result.obfuscation_score,
                duplicate = result.duplicate,
                "Spam message detected"
            );
        } else {
            debug!(chat_id, user_id, confidence = result.confidence, "Message clean");
        }
        result
    }

    /// Risk score and tier for a username or display name.
    pub fn classify_username(&self, username: &str) -> UsernameRisk {
        let entries = self.username_keywords.entries();
        let risk = self.username_scorer.score(
            username,
            &entries,
            self.aggregator.matcher(),
            self.aggregator.obfuscation(),
        );
        debug!(score = risk.score, tier = %risk.tier, "Username scored");
        risk
    }

    /// Obfuscation evidence for raw text, without classifying it.
    pub fn obfuscation_report(&self, raw: &str) -> ObfuscationReport {
        self.aggregator.obfuscation().score(raw)
    }

    /// Global table merged with the chat's additions. A term present in both
    /// keeps the higher weight.
    fn entries_for(&self, chat_id: ChatId) -> Vec<KeywordEntry> {
        let mut entries = self.keywords.entries();
        let Some(chat_entries) = self.chat_keywords.get(&chat_id).map(|t| t.entries()) else {
            return entries;
        };
        for extra in chat_entries {
            match entries.iter_mut().find(|e| e.term == extra.term) {
                Some(existing) => existing.weight = existing.weight.max(extra.weight),
                None => entries.push(extra),
            }
        }
        entries
    }

    // ---------------------------------------------------------------------
    // Keyword management
    // ---------------------------------------------------------------------

    /// Add a global keyword. Duplicate or blank terms are a no-op.
    pub fn add_keyword(&self, term: &str, weight: f32) -> bool {
        self.keywords.add(term, weight)
    }

    /// Remove a global keyword. Absent terms are a no-op.
    pub fn remove_keyword(&self, term: &str) -> bool {
        self.keywords.remove(term)
    }

    /// Normalized global terms, sorted.
    pub fn list_keywords(&self) -> Vec<String> {
        self.keywords.terms()
    }

    /// Current weight of a global keyword.
    pub fn keyword_weight(&self, term: &str) -> Option<f32> {
        self.keywords.weight(term)
    }

    /// Add a keyword that only applies in `chat_id`.
    pub fn add_chat_keyword(&self, chat_id: ChatId, term: &str, weight: f32) -> bool {
        self.chat_keywords.entry(chat_id).or_default().add(term, weight)
    }

    pub fn remove_chat_keyword(&self, chat_id: ChatId, term: &str) -> bool {
        let removed = self
            .chat_keywords
            .get(&chat_id)
            .is_some_and(|table| table.remove(term));
        self.chat_keywords.remove_if(&chat_id, |_, table| table.is_empty());
        removed
    }

    pub fn list_chat_keywords(&self, chat_id: ChatId) -> Vec<String> {
        self.chat_keywords
            .get(&chat_id)
            .map(|table| table.terms())
            .unwrap_or_default()
    }

    pub fn add_username_keyword(&self, term: &str, weight: f32) -> bool {
        self.username_keywords.add(term, weight)
    }

    pub fn remove_username_keyword(&self, term: &str) -> bool {
        self.username_keywords.remove(term)
    }

    pub fn list_username_keywords(&self) -> Vec<String> {
        self.username_keywords.terms()
    }

    // ---------------------------------------------------------------------
    // Feedback
    // ---------------------------------------------------------------------

    /// A flagged message was legitimate: decay the weights of `terms`.
    pub fn report_false_positive(&self, terms: &[String]) -> Vec<(String, f32)> {
        self.report_correction(CorrectionKind::FalsePositive, terms, None)
    }

    /// A spam message was missed: grow the weights of `terms`.
    pub fn report_false_negative(&self, terms: &[String]) -> Vec<(String, f32)> {
        self.report_correction(CorrectionKind::FalseNegative, terms, None)
    }

    /// Apply a correction, logging a prefix of `sample` with it.
    ///
    /// Adjusts the global table only; per-chat terms keep their weights.
    pub fn report_correction(&self, kind: CorrectionKind, terms: &[String], sample: Option<&str>) -> Vec<(String, f32)> {
        self.learning.record_correction(kind, &self.keywords, terms, sample)
    }

    pub fn learning_stats(&self) -> LearningStats {
        self.learning.stats()
    }

    // ---------------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------------

    /// Drop expired duplicate windows. Returns the number of senders removed.
    pub fn sweep_windows(&self, now: Instant) -> usize {
        self.duplicates.sweep(now)
    }

    /// Drop the duplicate window of one sender, e.g. after a moderator
    /// cleared their messages. Returns whether anything was tracked.
    pub fn forget_sender(&self, chat_id: ChatId, user_id: UserId) -> bool {
        let removed = self.duplicates.forget(chat_id, user_id);
        if removed {
            debug!(chat_id, user_id, "Forgot sender duplicate window");
        }
        removed
    }

    pub fn tracked_senders(&self) -> usize {
        self.duplicates.tracked_senders()
    }

    fn capture(&self) -> EngineSnapshot {
        let mut chat_keywords: Vec<(ChatId, Vec<KeywordEntry>)> = self
            .chat_keywords
            .iter()
            .map(|e| (*e.key(), e.value().entries()))
            .collect();
        chat_keywords.sort_by_key(|(chat_id, _)| *chat_id);

        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            normalization_version: NORMALIZATION_VERSION,
            keyword_table_version: KEYWORD_TABLE_VERSION,
            keywords: self.keywords.entries(),
            chat_keywords,
            username_keywords: self.username_keywords.entries(),
            learning: self.learning.export(),
        }
    }

    fn apply(&self, snapshot: EngineSnapshot) {
        if snapshot.normalization_version != NORMALIZATION_VERSION {
            info!(
                stored = snapshot.normalization_version,
                current = NORMALIZATION_VERSION,
                "Snapshot terms were normalized with older tables; re-normalizing"
            );
        }
        self.keywords.replace(&snapshot.keywords);
        self.username_keywords.replace(&snapshot.username_keywords);
        self.chat_keywords.clear();
        for (chat_id, entries) in snapshot.chat_keywords {
            let table = KeywordTable::new();
            table.replace(&entries);
            if !table.is_empty() {
                self.chat_keywords.insert(chat_id, table);
            }
        }
        self.learning.import(snapshot.learning);
    }

    /// Encode keyword tables and learning state as MessagePack.
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        self.capture().encode()
    }

    /// Replace keyword tables and learning state from [`snapshot`](Self::snapshot)
    /// bytes. On error nothing is changed.
    pub fn restore(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let snapshot = EngineSnapshot::decode(bytes)?;
        self.apply(snapshot);
        info!(keywords = self.keywords.len(), "Engine state restored");
        Ok(())
    }

    /// Write a snapshot to `path` atomically.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        self.capture().save(path)
    }

    /// Restore from a file written by [`save_snapshot`](Self::save_snapshot).
    pub fn load_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let snapshot = EngineSnapshot::load(path)?;
        self.apply(snapshot);
        info!(path = %path.display(), keywords = self.keywords.len(), "Engine state loaded");
        Ok(())
    }
}
