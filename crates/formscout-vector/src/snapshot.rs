//! On-disk snapshot of the vector index.
//!
//! The file is JSON: `{version, dimension, entries: {id: {vector, kind, stored_at}}}`.
//! Writes go to a sibling temp file that is renamed into place so a crash
//! never leaves a half-written index behind.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::index::{IndexEntry, VectorIndex};

const SNAPSHOT_VERSION: u32 = 1;

/// Error type for index snapshot files.
#[derive(Debug, thiserror::Error)]
pub enum IndexFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt index file: {0}")]
    Corrupt(String),

    #[error("Index dimension {found} does not match expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Unsupported index version: {0}")]
    UnsupportedVersion(u32),
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimension: usize,
    entries: HashMap<String, IndexEntry>,
}

impl VectorIndex {
    /// Write the index to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), IndexFileError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension(),
            entries: self.entries.read().clone(),
        };
        let bytes =
            serde_json::to_vec(&snapshot).map_err(|e| IndexFileError::Corrupt(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!("Saved vector index ({} entries) to {}", self.len(), path.display());
        Ok(())
    }

    /// Load an index from `path`, checking it matches `dimension`.
    pub fn load(path: &Path, dimension: usize) -> Result<Self, IndexFileError> {
        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| IndexFileError::Corrupt(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexFileError::UnsupportedVersion(snapshot.version));
        }
        if snapshot.dimension != dimension {
            return Err(IndexFileError::DimensionMismatch {
                expected: dimension,
                found: snapshot.dimension,
            });
        }
        if let Some((id, entry)) = snapshot
            .entries
            .iter()
            .find(|(_, e)| e.vector.len() != dimension)
        {
            return Err(IndexFileError::Corrupt(format!(
                "entry {} has {} components",
                id,
                entry.vector.len()
            )));
        }

        let index = VectorIndex::new(dimension);
        *index.entries.write() = snapshot.entries;
        Ok(index)
    }
}
