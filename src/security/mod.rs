//! Detection pipeline for adsift.
//!
//! Provides the classification components:
//! - **Normalization**: canonical text so obfuscated spellings match clean ones
//! - **Obfuscation**: structural evasion scoring on raw text
//! - **Keywords**: weighted, normalized term tables
//! - **Matching**: exact, fuzzy, phrase, phone and contact evidence
//! - **Duplicates**: per-sender repeat windows
//! - **Username risk**: tiered scoring for handles and display names
//! - **Learning**: moderator corrections and detection statistics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SpamDetectionService                        │
//! ├───────────┬────────────┬──────────────┬────────────┬─────────────┤
//! │ normalize │ Obfuscation│ KeywordTable │ Duplicate  │  Learning   │
//! │ NFKC+fold │  Scorer    │ DashMap      │ Signal     │  Store      │
//! │ separators│ tags       │ + Matcher    │ windows    │  RwLock log │
//! └───────────┴────────────┴──────────────┴────────────┴─────────────┘
//!                    ConfidenceAggregator -> DetectionResult
//! ```

pub mod aggregate;
pub mod duplicate;
pub mod keywords;
pub mod learning;
pub mod matcher;
pub mod normalize;
pub mod obfuscation;
pub mod snapshot;
pub mod spam;
pub mod username;

// Re-export primary types for convenience
pub use aggregate::{ConfidenceAggregator, DetectionResult};
pub use duplicate::DuplicateSignal;
pub use keywords::{KEYWORD_TABLE_VERSION, KeywordEntry, KeywordTable};
pub use learning::{CorrectionKind, CorrectionRecord, LearningState, LearningStats, LearningStore};
pub use matcher::{KeywordMatcher, MatchKind, MatchOutcome, TermMatch, similarity};
pub use normalize::{NORMALIZATION_VERSION, normalize};
pub use obfuscation::{ObfuscationReport, ObfuscationScorer, ObfuscationTag};
pub use snapshot::{EngineSnapshot, SNAPSHOT_VERSION};
pub use spam::SpamDetectionService;
pub use username::{RiskTier, UsernameRisk, UsernameRiskScorer};
