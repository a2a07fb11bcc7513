//! Directory Entry Tree
//!
//! In-memory mapping from absolute directory path to [`CacheNode`], limited to
//! album entries and their ancestors up to the library root.
//!
//! Invariants kept by every mutation:
//! - every non-root node's ancestor chain up to the root is present;
//! - a node's `children` set holds exactly the tracked paths whose parent is
//!   that node.
//!
//! Cascading operations (delete, re-key) walk the subtree with an explicit
//! stack; nesting depth is unbounded.

use super::node::CacheNode;
use super::probe::FsProbe;
use crate::error::ApiError;
use crate::types::{Extensions, FsChange, Inode, Modification};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Replace the `from` prefix of `path` with `to`.
fn rebase(path: &Path, from: &Path, to: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(suffix) if suffix.as_os_str().is_empty() => to.to_path_buf(),
        Ok(suffix) => to.join(suffix),
        Err(_) => path.to_path_buf(),
    }
}

/// A subtree removed from the tree, kept so it can be re-attached elsewhere.
#[derive(Debug, Clone)]
pub struct DetachedSubtree {
    root: PathBuf,
    nodes: Vec<(PathBuf, CacheNode)>,
}

impl DetachedSubtree {
    /// Path the subtree was detached from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identity of the subtree's top directory.
    pub fn identity(&self) -> Inode {
        self.nodes.first().map(|(_, n)| n.inode).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.nodes.iter().map(|(p, _)| p.as_path())
    }

    pub fn album_entries(&self) -> impl Iterator<Item = &Path> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.is_album_entry)
            .map(|(p, _)| p.as_path())
    }
}

/// Directory tree of album entries and their ancestors
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: PathBuf,
    nodes: HashMap<PathBuf, CacheNode>,
    extensions: Extensions,
    probe: Arc<dyn FsProbe>,
}

impl DirectoryTree {
    /// Create an empty tree for the library rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, extensions: Extensions, probe: Arc<dyn FsProbe>) -> Self {
        Self {
            root: root.into(),
            nodes: HashMap::new(),
            extensions,
            probe,
        }
    }

    /// Rebuild a tree from persisted nodes. Nodes outside `root` are dropped.
    pub fn from_nodes(
        root: impl Into<PathBuf>,
        extensions: Extensions,
        probe: Arc<dyn FsProbe>,
        nodes: impl IntoIterator<Item = (PathBuf, CacheNode)>,
    ) -> Self {
        let root = root.into();
        let nodes = nodes
            .into_iter()
            .filter(|(p, _)| {
                let inside = p.starts_with(&root);
                if !inside {
                    tracing::warn!(path = %p.display(), "Dropping cached path outside library root");
                }
                inside
            })
            .collect();
        Self {
            root,
            nodes,
            extensions,
            probe,
        }
    }

    /// Empty tree sharing this tree's root, extensions and probe.
    pub fn empty_like(&self) -> Self {
        Self::new(self.root.clone(), self.extensions.clone(), Arc::clone(&self.probe))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn probe(&self) -> &Arc<dyn FsProbe> {
        &self.probe
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&CacheNode> {
        self.nodes.get(path)
    }

    pub fn nodes(&self) -> &HashMap<PathBuf, CacheNode> {
        &self.nodes
    }

    /// All tracked paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.nodes.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Album entry paths, sorted.
    pub fn album_entries(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.is_album_entry)
            .map(|(p, _)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Album entries at or below `dir`, sorted.
    pub fn album_entries_under(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .nodes
            .iter()
            .filter(|(p, n)| n.is_album_entry && p.starts_with(dir))
            .map(|(p, _)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Absent paths are not album entries.
    pub fn is_album_entry(&self, path: &Path) -> bool {
        self.nodes
            .get(path)
            .map(|n| n.is_album_entry)
            .unwrap_or(false)
    }

    fn check_in_root(&self, path: &Path) -> Result<(), ApiError> {
        if path.starts_with(&self.root) {
            Ok(())
        } else {
            Err(ApiError::PathOutsideRoot(path.to_path_buf()))
        }
    }

    /// Ensure `path` and every ancestor up to the root are tracked.
    ///
    /// Identities are probed only for nodes that do not exist yet, and all of
    /// them are probed before anything is inserted, so a probe failure leaves
    /// the tree unchanged. Returns the newly created paths, deepest first.
    pub fn add(&mut self, path: &Path) -> Result<Vec<PathBuf>, ApiError> {
        self.check_in_root(path)?;

        let mut missing: Vec<(PathBuf, Inode)> = Vec::new();
        let mut current = path.to_path_buf();
        loop {
            if self.nodes.contains_key(&current) {
                break;
            }
            let inode = self.probe.identity(&current)?;
            missing.push((current.clone(), inode));
            if current == self.root {
                break;
            }
            current = match current.parent() {
                Some(parent) => parent.to_path_buf(),
                None => return Err(ApiError::PathOutsideRoot(path.to_path_buf())),
            };
        }

        for (p, inode) in &missing {
            self.nodes.insert(p.clone(), CacheNode::new(*inode));
        }
        for (p, _) in &missing {
            if *p == self.root {
                continue;
            }
            if let Some(parent) = p.parent() {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.insert(p.clone());
                }
            }
        }

        Ok(missing.into_iter().map(|(p, _)| p).collect())
    }

    /// `add` then flag the node as an album entry. Returns true when the flag
    /// was not set before.
    pub fn mark_album_entry(&mut self, path: &Path) -> Result<bool, ApiError> {
        self.add(path)?;
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| ApiError::PathNotInTree(path.to_path_buf()))?;
        let newly = !node.is_album_entry;
        node.is_album_entry = true;
        Ok(newly)
    }

    /// Clear the album-entry flag; a node left without tracked children is
    /// deleted. Returns true when the node was deleted.
    pub fn demote(&mut self, path: &Path) -> Result<bool, ApiError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| ApiError::PathNotInTree(path.to_path_buf()))?;
        node.is_album_entry = false;
        if node.children.is_empty() {
            self.delete(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Walk up from the parent of `path` and delete every non-root ancestor
    /// that is neither an album entry nor leads to one. Returns the pruned
    /// paths, deepest first.
    pub fn prune_ancestors(&mut self, path: &Path) -> Vec<PathBuf> {
        let mut pruned = Vec::new();
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            let prunable = matches!(
                self.nodes.get(dir),
                Some(node) if !node.is_album_entry && node.children.is_empty()
            );
            if !prunable {
                break;
            }
            if self.detach(dir).is_err() {
                break;
            }
            pruned.push(dir.to_path_buf());
            current = dir.parent();
        }
        pruned
    }

    /// Re-key `old` and all descendants to `new`, preserving identities.
    ///
    /// Records a pending rename on the moved node. Absent `old` fails with
    /// [`ApiError::PathNotInTree`]; an occupied `new` fails with
    /// [`ApiError::PathAlreadyInTree`].
    pub fn rename(&mut self, old: &Path, new: &Path) -> Result<(), ApiError> {
        if !self.nodes.contains_key(old) {
            return Err(ApiError::PathNotInTree(old.to_path_buf()));
        }
        if old == new {
            return Ok(());
        }
        if new.starts_with(old) {
            return Err(ApiError::StorageError(
                crate::error::StorageError::InvalidPath(format!(
                    "cannot move {} into itself",
                    old.display()
                )),
            ));
        }
        self.prepare_destination(new)?;
        let subtree = self.detach(old)?;
        self.restore(subtree, new)
    }

    /// Remove `path` and every descendant.
    pub fn delete(&mut self, path: &Path) -> Result<(), ApiError> {
        self.detach(path).map(|_| ())
    }

    /// Cascade-remove `path` and return the removed nodes, top node first.
    pub fn detach(&mut self, path: &Path) -> Result<DetachedSubtree, ApiError> {
        if !self.nodes.contains_key(path) {
            return Err(ApiError::PathNotInTree(path.to_path_buf()));
        }

        if path != self.root {
            if let Some(parent) = path.parent() {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.remove(path);
                }
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![path.to_path_buf()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().rev().cloned());
                removed.push((current, node));
            }
        }

        Ok(DetachedSubtree {
            root: path.to_path_buf(),
            nodes: removed,
        })
    }

    /// Validate that `new` can receive a subtree and make sure its parent
    /// chain is tracked. After success, [`Self::reattach`] and
    /// [`Self::restore`] at `new` cannot fail.
    pub fn prepare_destination(&mut self, new: &Path) -> Result<(), ApiError> {
        self.check_in_root(new)?;
        if self.nodes.contains_key(new) {
            return Err(ApiError::PathAlreadyInTree(new.to_path_buf()));
        }
        if new != self.root {
            if let Some(parent) = new.parent() {
                self.add(parent)?;
            }
        }
        Ok(())
    }

    /// Insert a detached subtree at `new` without touching pending state.
    pub fn reattach(&mut self, subtree: DetachedSubtree, new: &Path) -> Result<(), ApiError> {
        self.prepare_destination(new)?;

        let from = subtree.root;
        for (old_path, mut node) in subtree.nodes {
            let new_path = rebase(&old_path, &from, new);
            node.children = node
                .children
                .iter()
                .map(|c| rebase(c, &from, new))
                .collect();
            if let Some(pending) = node.pending.as_mut() {
                if let Some(name) = pending.new_name.as_mut() {
                    *name = rebase(name, &from, new);
                }
            }
            self.nodes.insert(new_path, node);
        }

        if new != self.root {
            if let Some(parent) = new.parent() {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.insert(new.to_path_buf());
                }
            }
        }
        Ok(())
    }

    /// Re-attach a subtree that moved on disk and record the rename as the
    /// moved node's pending modification.
    ///
    /// A pending `created` stays `created`; a pending rename keeps its first
    /// `old_name`.
    pub fn restore(&mut self, subtree: DetachedSubtree, new: &Path) -> Result<(), ApiError> {
        let old = subtree.root.clone();
        self.reattach(subtree, new)?;
        if let Some(node) = self.nodes.get_mut(new) {
            node.pending = match node.pending.take() {
                Some(m) if m.change == FsChange::Created => Some(m),
                Some(m) if m.change == FsChange::Renamed => Some(Modification {
                    change: FsChange::Renamed,
                    new_name: Some(new.to_path_buf()),
                    old_name: m.old_name.or(Some(old)),
                }),
                _ => Some(Modification {
                    change: FsChange::Renamed,
                    new_name: Some(new.to_path_buf()),
                    old_name: Some(old),
                }),
            };
        }
        Ok(())
    }

    /// Record an undelivered change for `path`.
    pub fn set_pending_modification(
        &mut self,
        path: &Path,
        modification: Modification,
    ) -> Result<(), ApiError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| ApiError::PathNotInTree(path.to_path_buf()))?;
        node.pending = Some(modification);
        Ok(())
    }

    /// Reset the pending state once the change has been delivered. Returns
    /// the cleared modification; an absent path is a no-op.
    pub fn clear_pending_modification(&mut self, path: &Path) -> Option<Modification> {
        self.nodes.get_mut(path).and_then(|n| n.pending.take())
    }

    /// Number of nodes carrying an undelivered change.
    pub fn pending_count(&self) -> usize {
        self.nodes.values().filter(|n| n.pending.is_some()).count()
    }

    /// Check the structural invariants and describe every violation found.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (path, node) in &self.nodes {
            if !path.starts_with(&self.root) {
                errors.push(format!("{} is outside the root", path.display()));
                continue;
            }
            if *path != self.root {
                match path.parent().and_then(|p| self.nodes.get(p)) {
                    Some(parent) if parent.children.contains(path) => {}
                    Some(_) => errors.push(format!(
                        "{} missing from its parent's children",
                        path.display()
                    )),
                    None => errors.push(format!("{} has no tracked parent", path.display())),
                }
            }
            for child in &node.children {
                if child.parent() != Some(path.as_path()) {
                    errors.push(format!(
                        "{} lists {} which is not a direct child",
                        path.display(),
                        child.display()
                    ));
                } else if !self.nodes.contains_key(child) {
                    errors.push(format!(
                        "{} lists untracked child {}",
                        path.display(),
                        child.display()
                    ));
                }
            }
        }
        errors.sort();
        errors
    }
}
