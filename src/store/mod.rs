//! Snapshot Store
//!
//! Flat persistence of the directory tree between service sessions. The
//! snapshot seeds offline reconciliation at the next start.

pub mod persistence;

use crate::error::ApiError;
use crate::tree::{CacheNode, DirectoryTree, FsProbe};
use crate::types::{path_serde, Extensions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use persistence::JsonSnapshotStore;

/// Persisted form of a [`DirectoryTree`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "path_serde::option")]
    pub root_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    #[serde(with = "path_serde::map")]
    pub cache: BTreeMap<PathBuf, CacheNode>,
}

impl Snapshot {
    pub fn from_tree(tree: &DirectoryTree) -> Self {
        Self {
            root_dir: Some(tree.root().to_path_buf()),
            extensions: Some(tree.extensions().clone()),
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            cache: tree
                .nodes()
                .iter()
                .map(|(p, n)| (p.clone(), n.clone()))
                .collect(),
        }
    }

    /// True when the snapshot was taken for a different library root.
    pub fn is_foreign(&self, root: &Path) -> bool {
        matches!(&self.root_dir, Some(saved) if saved != root)
    }

    pub fn into_tree(
        self,
        root: &Path,
        extensions: Extensions,
        probe: Arc<dyn FsProbe>,
    ) -> DirectoryTree {
        DirectoryTree::from_nodes(root, extensions, probe, self.cache)
    }
}

/// Snapshot storage interface
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when no snapshot was saved yet.
    fn load(&self) -> Result<Option<Snapshot>, ApiError>;
    fn save(&self, tree: &DirectoryTree) -> Result<(), ApiError>;
    fn location(&self) -> &Path;
}
