//! Scanner: populates a [`DirectoryTree`] from disk
//!
//! Depth-first, subdirectories before files. A directory becomes an album
//! entry as soon as one direct file with a supported extension is seen; the
//! remaining files of that directory only cost a flag lookup. The first I/O
//! error aborts the walk.

use super::entries::DirectoryTree;
use crate::error::{ApiError, StorageError};
use std::cmp::Ordering as CmpOrdering;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

fn directories_first(a: &DirEntry, b: &DirEntry) -> CmpOrdering {
    b.file_type()
        .is_dir()
        .cmp(&a.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Recursive library walker
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    cancel: Option<Arc<AtomicBool>>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the walk with [`ApiError::ScanCancelled`] once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Scan the whole library into `tree`.
    pub fn calculate(&self, tree: &mut DirectoryTree) -> Result<(), ApiError> {
        let root = tree.root().to_path_buf();
        let marked = self.calculate_into(tree, &root)?;
        info!(
            root = %root.display(),
            album_entries = marked.len(),
            tracked = tree.len(),
            "Library scan completed"
        );
        Ok(())
    }

    /// Scan `dir` into an existing tree. Returns the directories that became
    /// album entries during this walk.
    ///
    /// On error the tree keeps whatever was marked before the failure.
    pub fn calculate_into(
        &self,
        tree: &mut DirectoryTree,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ApiError> {
        let mut marked = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .contents_first(true)
            .sort_by(directories_first);

        for entry in walker {
            if self.is_cancelled() {
                debug!(dir = %dir.display(), "Scan cancelled");
                return Err(ApiError::ScanCancelled);
            }
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf());
                ApiError::StorageError(StorageError::at(path, e.into()))
            })?;
            if !entry.file_type().is_file() || !tree.extensions().is_supported(entry.path()) {
                continue;
            }
            let Some(parent) = entry.path().parent() else {
                continue;
            };
            if tree.is_album_entry(parent) {
                continue;
            }
            if tree.mark_album_entry(parent)? {
                debug!(path = %parent.display(), "Album entry found");
                marked.push(parent.to_path_buf());
            }
        }

        Ok(marked)
    }
}
