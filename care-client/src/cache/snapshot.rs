//! On-disk copy of the cache
//!
//! Written to a temporary file and renamed over the old one, so a crash
//! mid-write leaves the previous snapshot intact.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::CacheKey;
use crate::ClientResult;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: CacheKey,
    pub value: Value,
    pub fetched_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries from the last save; empty when there is none yet
    ///
    /// A snapshot from another format version is ignored rather than failing
    /// the client start.
    pub fn load(&self) -> ClientResult<Vec<SnapshotEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&self.path)?;
        let file: SnapshotFile = serde_json::from_str(&json)?;
        if file.version != SNAPSHOT_VERSION {
            tracing::warn!(
                path = %self.path.display(),
                version = file.version,
                "Ignoring cache snapshot of unknown version"
            );
            return Ok(Vec::new());
        }
        Ok(file.entries)
    }

    pub fn save(&self, entries: Vec<SnapshotEntry>) -> ClientResult<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string(&SnapshotFile {
            version: SNAPSHOT_VERSION,
            entries,
        })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn delete(&self) -> ClientResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
