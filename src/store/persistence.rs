//! JSON snapshot file

use super::{Snapshot, SnapshotStore};
use crate::error::{ApiError, StorageError};
use crate::tree::DirectoryTree;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Snapshot stored as a single JSON document
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>, ApiError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::at(&self.path, e).into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&data).map_err(StorageError::from)?;
        debug!(
            path = %self.path.display(),
            nodes = snapshot.cache.len(),
            "Loaded snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Written to a sibling temp file first, then renamed into place.
    fn save(&self, tree: &DirectoryTree) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::at(parent, e))?;
            }
        }
        let data = serde_json::to_vec(&Snapshot::from_tree(tree)).map_err(StorageError::from)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|e| StorageError::at(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StorageError::at(&self.path, e))?;
        debug!(path = %self.path.display(), nodes = tree.len(), "Saved snapshot");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
