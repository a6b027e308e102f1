//! Error types for adsift.
//!
//! Classification itself never fails; errors only come from loading
//! configuration and from saving or restoring engine snapshots.

use thiserror::Error;

pub use crate::config::{ConfigError, ValidationError};

/// Errors from snapshot encoding, decoding and persistence.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("snapshot decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapshotError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "snapshot_encode",
            Self::Decode(_) => "snapshot_decode",
            Self::UnsupportedVersion { .. } => "snapshot_version",
            Self::Io(_) => "snapshot_io",
        }
    }
}
