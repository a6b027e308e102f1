//! MessagePack snapshots of mutable engine state.
//!
//! Covers the keyword tables (including learned weights and per-chat
//! additions) and the learning log. Duplicate windows are transient and are
//! not saved.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::ChatId;
use crate::error::SnapshotError;
use crate::security::keywords::KeywordEntry;
use crate::security::learning::LearningState;

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    /// Normalization tables the stored terms were folded with.
    pub normalization_version: u32,
    pub keyword_table_version: u32,
    pub keywords: Vec<KeywordEntry>,
    pub chat_keywords: Vec<(ChatId, Vec<KeywordEntry>)>,
    pub username_keywords: Vec<KeywordEntry>,
    pub learning: LearningState,
}

impl EngineSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode and check the format version.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = rmp_serde::from_slice(bytes)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(())
    }

    /// Write to `path` through a temp file and rename, so a crash never
    /// leaves a truncated snapshot behind.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let temp_path = path.with_extension("msgpack.tmp");
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        rmp_serde::encode::write_named(&mut writer, self)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&temp_path, path)?;
        debug!(path = %path.display(), "Engine snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Self = rmp_serde::from_read(reader)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }
}
