//! JSON snapshot file for [`super::MemoryStore`].
//!
//! The whole store is written as one pretty-printed JSON document. Writes go
//! to a sibling temporary file first and are renamed into place, so a crash
//! mid-write leaves the previous snapshot intact.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::models::{Comment, Composition};

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk layout of a store snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    /// Next composition id to hand out.
    pub next_composition_id: u64,
    /// Next comment id to hand out.
    pub next_comment_id: u64,
    /// Compositions in insertion order.
    pub compositions: Vec<Composition>,
    /// Comments in insertion order.
    pub comments: Vec<Comment>,
}

/// Read a snapshot. `Ok(None)` when the file does not exist yet.
pub fn load(path: &Path) -> StoreResult<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::SnapshotVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(Some(snapshot))
}

/// Write a snapshot, replacing any previous file.
pub fn save(path: &Path, snapshot: &Snapshot) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let content = serde_json::to_string_pretty(snapshot)?;
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}
