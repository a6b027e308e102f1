//! adsift - obfuscation-aware spam advertisement detection for chat moderation.
//!
//! The entry point is [`SpamDetectionService`]: build it from a [`Config`],
//! share it between message handlers, and call
//! [`classify_message`](SpamDetectionService::classify_message) for every
//! message.
//!
//! ```no_run
//! use adsift::{Config, SpamDetectionService};
//!
//! let service = SpamDetectionService::new(Config::default());
//! let result = service.classify_message("س.ك.ل.ي.ف", -100, 42, 0.7);
//! assert!(result.is_spam);
//! ```

pub mod config;
pub mod error;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ConfigError, SnapshotError};
pub use security::{DetectionResult, RiskTier, SpamDetectionService, UsernameRisk};

/// Chat (group) identifier, as assigned by the hosting platform.
pub type ChatId = i64;
/// Sender identifier, as assigned by the hosting platform.
pub type UserId = i64;
