//! Pending Rename Table
//!
//! Directories removed from disk whose identity has not yet reappeared under
//! a new path. O(1) lookup by identity; bounded, oldest entry evicted first.

use crate::tree::DetachedSubtree;
use crate::types::Inode;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Removed directory awaiting a matching create
#[derive(Debug, Clone)]
pub struct PendingRename {
    pub path: PathBuf,
    pub subtree: DetachedSubtree,
}

/// Identity -> removed subtree
#[derive(Debug)]
pub struct PendingRenameTable {
    entries: HashMap<Inode, PendingRename>,
    order: VecDeque<Inode>,
    capacity: usize,
}

impl PendingRenameTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Park a removed subtree under its identity. Returns the path of an
    /// entry evicted to stay within capacity.
    pub fn insert(&mut self, inode: Inode, subtree: DetachedSubtree) -> Option<PathBuf> {
        let path = subtree.root().to_path_buf();
        if self.entries.insert(inode, PendingRename { path, subtree }).is_some() {
            self.order.retain(|i| *i != inode);
        }
        self.order.push_back(inode);

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                return self.entries.remove(&oldest).map(|p| p.path);
            }
        }
        None
    }

    pub fn take(&mut self, inode: Inode) -> Option<PendingRename> {
        let pending = self.entries.remove(&inode)?;
        self.order.retain(|i| *i != inode);
        Some(pending)
    }

    pub fn contains(&self, inode: Inode) -> bool {
        self.entries.contains_key(&inode)
    }

    pub fn path_for(&self, inode: Inode) -> Option<&Path> {
        self.entries.get(&inode).map(|p| p.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
