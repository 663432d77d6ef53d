//! Persistence of the working set.
//!
//! The whole set is written on every save. The pipelines save after each
//! record they change, so an interrupted run loses at most the record it
//! was working on.

use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};
use crate::record::Record;

pub trait RecordStore {
    fn load(&self) -> SyncResult<Vec<Record>>;
    fn save(&self, records: &[Record]) -> SyncResult<()>;
}

/// Working set stored as a single JSON array on disk.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "events.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for JsonStore {
    /// A missing file is an empty working set (first run).
    fn load(&self) -> SyncResult<Vec<Record>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;

        serde_json::from_str(&content).map_err(|e| {
            SyncError::Serialization(format!("Failed to parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, records: &[Record]) -> SyncResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(records)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        let temp = self.temp_path();
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;

        Ok(())
    }
}
