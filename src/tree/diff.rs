//! Snapshot Diff Engine
//!
//! Reconciles a freshly scanned tree against a previously persisted one.
//! Identity equality is the only rename signal.

use super::entries::DirectoryTree;
use super::probe::NO_IDENTITY;
use crate::types::{FsChange, Inode, Modification};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Changes keyed by affected path; a rename is keyed by its old path.
pub type ChangeSet = BTreeMap<PathBuf, Modification>;

/// Compare `fresh` against `old`.
///
/// 1. Paths new in `fresh` become renames when some `old` node carries the
///    same identity, otherwise creations. The source may still exist in
///    `fresh` under a different identity (moved away, then recreated).
/// 2. Vanished `old` paths not consumed as rename sources become deletions.
/// 3. Undelivered pending changes on `old` nodes that still exist are
///    carried forward.
///
/// Candidates are visited in path order, so the first match on an identity
/// collision is deterministic. Each rename source is consumed once. An `old`
/// node whose path still holds the same identity did not move and is never
/// a source.
pub fn compare(fresh: &DirectoryTree, old: &DirectoryTree) -> ChangeSet {
    let mut changes = ChangeSet::new();

    let mut vanished: Vec<&PathBuf> = old
        .nodes()
        .keys()
        .filter(|p| !fresh.contains(p))
        .collect();
    vanished.sort();

    let mut candidates: Vec<(&PathBuf, Inode)> = old
        .nodes()
        .iter()
        .map(|(p, n)| (p, n.inode))
        .filter(|(p, inode)| {
            *inode != NO_IDENTITY && fresh.get(p).map(|n| n.inode) != Some(*inode)
        })
        .collect();
    candidates.sort();

    let mut by_identity: HashMap<Inode, PathBuf> = HashMap::new();
    for (path, inode) in candidates {
        by_identity.entry(inode).or_insert_with(|| path.clone());
    }

    let mut appeared: Vec<&PathBuf> = fresh
        .nodes()
        .keys()
        .filter(|p| !old.contains(p))
        .collect();
    appeared.sort();

    for path in appeared {
        let inode = fresh.nodes()[path].inode;
        let source = if inode == NO_IDENTITY {
            None
        } else {
            by_identity.remove(&inode)
        };
        match source {
            Some(old_path) => {
                changes.insert(old_path, Modification::renamed(path.clone()));
            }
            None => {
                changes.insert(path.clone(), Modification::created());
            }
        }
    }

    for path in vanished {
        changes
            .entry(path.clone())
            .or_insert_with(Modification::deleted);
    }

    let mut carried: Vec<(&PathBuf, &Modification)> = old
        .nodes()
        .iter()
        .filter(|(p, _)| fresh.contains(p))
        .filter_map(|(p, n)| n.pending.as_ref().map(|m| (p, m)))
        .collect();
    carried.sort_by(|a, b| a.0.cmp(b.0));

    for (path, pending) in carried {
        let (key, modification) = match pending.change {
            FsChange::Renamed => (
                pending.old_name.clone().unwrap_or_else(|| path.clone()),
                Modification::renamed(path.clone()),
            ),
            FsChange::Created => (path.clone(), Modification::created()),
            FsChange::Deleted => (path.clone(), Modification::deleted()),
        };
        changes.entry(key).or_insert(modification);
    }

    changes
}
