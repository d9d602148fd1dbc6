//! Snapshot file persistence
//!
//! One file per data directory. Writes go to a temp file that is synced and
//! renamed over the previous snapshot, so a crash mid-write leaves the last
//! good snapshot in place.

use l2_settlement::{SettlementError, SettlementSnapshot};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Corrupt(#[from] SettlementError),
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved snapshot, or `None` on first start.
    pub fn load(&self) -> Result<Option<SettlementSnapshot>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[l2] No snapshot at {}, starting fresh", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };
        info!(
            "[l2] Found snapshot {} ({} bytes)",
            self.path.display(),
            bytes.len()
        );
        Ok(Some(SettlementSnapshot::decode(&bytes)?))
    }

    pub fn save(&self, snapshot: &SettlementSnapshot) -> Result<(), StoreError> {
        let bytes = snapshot.encode()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;

        info!(
            "[l2] Saved snapshot at height {} ({} bytes)",
            snapshot.saved_at,
            bytes.len()
        );
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
