//! Disk-backed snapshot of the session store.
//!
//! The conversations map is written to a binary file in the data dir after
//! every mutation and read back once on startup.
//!
//! # Invalidation
//! A snapshot is discarded (and the store starts empty) when:
//! - `SNAPSHOT_SCHEMA_VERSION` differs from the one it was written with
//! - the file is missing or corrupt

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::SESSION_SNAPSHOT_FILE;
use crate::models::{ConversationId, ConversationState};

/// Bump whenever `ConversationState` or `Message` change shape.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotEnvelopeRef<'a> {
    schema_version: u32,
    saved_at: u64,
    conversations: &'a HashMap<ConversationId, ConversationState>,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    schema_version: u32,
    #[allow(dead_code)]
    saved_at: u64,
    conversations: HashMap<ConversationId, ConversationState>,
}

pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSION_SNAPSHOT_FILE)
}

/// Serialize without cloning; called while the store lock is held.
pub fn encode_snapshot(conversations: &HashMap<ConversationId, ConversationState>) -> Result<Vec<u8>> {
    let saved_at = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let envelope = SnapshotEnvelopeRef {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        saved_at,
        conversations,
    };
    bincode::serialize(&envelope).context("Failed to encode session snapshot")
}

/// Write-to-temp-then-rename so a crash mid-write never leaves a torn file.
pub fn write_snapshot(data_dir: &Path, bytes: &[u8]) -> Result<()> {
    let snapshot_file = snapshot_path(data_dir);
    let temp_file = snapshot_file.with_extension("bin.tmp");

    std::fs::write(&temp_file, bytes)
        .with_context(|| format!("Failed to write {}", temp_file.display()))?;
    std::fs::rename(&temp_file, &snapshot_file)
        .with_context(|| format!("Failed to replace {}", snapshot_file.display()))?;
    Ok(())
}

/// Returns `None` on any failure: missing file, corrupt data, version mismatch.
pub fn load_snapshot(data_dir: &Path) -> Option<HashMap<ConversationId, ConversationState>> {
    let bytes = std::fs::read(snapshot_path(data_dir)).ok()?;

    let envelope: SnapshotEnvelope = match bincode::deserialize(&bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "session snapshot is corrupt, starting empty");
            return None;
        }
    };

    if envelope.schema_version != SNAPSHOT_SCHEMA_VERSION {
        tracing::info!(
            "session snapshot: schema version mismatch (stored={} current={}), discarding",
            envelope.schema_version,
            SNAPSHOT_SCHEMA_VERSION
        );
        return None;
    }

    Some(envelope.conversations)
}

/// Best-effort writer. Each encoded snapshot carries the store revision it was
/// taken at; a write older than the last one on disk is skipped so concurrent
/// writers can never roll the file back.
#[derive(Debug)]
pub struct SnapshotWriter {
    data_dir: PathBuf,
    last_written: Mutex<u64>,
}

impl SnapshotWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            last_written: Mutex::new(0),
        }
    }

    /// Failures are logged and dropped; never retried.
    pub fn write(&self, revision: u64, bytes: &[u8]) {
        let mut last = self.last_written.lock();
        if revision <= *last {
            return;
        }
        match write_snapshot(&self.data_dir, bytes) {
            Ok(()) => *last = revision,
            Err(e) => tracing::warn!(error = %e, "failed to persist session snapshot"),
        }
    }
}
