//! Cache node representation

use crate::types::{path_serde, Inode, Modification};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Directory node: an album entry or an ancestor of one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNode {
    pub inode: Inode,
    /// Absolute paths of tracked child directories
    #[serde(default, with = "path_serde::set")]
    pub children: BTreeSet<PathBuf>,
    #[serde(default, rename = "album_entry", skip_serializing_if = "is_false")]
    pub is_album_entry: bool,
    /// Undelivered change for this node
    #[serde(default, rename = "modification", skip_serializing_if = "Option::is_none")]
    pub pending: Option<Modification>,
}

impl CacheNode {
    pub fn new(inode: Inode) -> Self {
        Self {
            inode,
            children: BTreeSet::new(),
            is_album_entry: false,
            pending: None,
        }
    }
}
