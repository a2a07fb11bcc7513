//! Live Change Correlator
//!
//! Per-path state machine over one ordered notification stream. A removed
//! tracked directory is detached, parked in the [`PendingRenameTable`] under
//! its identity and reported as deleted right away. A directory created with
//! a parked identity gets the parked subtree back under its new path and is
//! reported as renamed, so one logical move is observed as deleted followed
//! by renamed.

use super::events::{FsEvent, WatchConfig};
use super::pending::PendingRenameTable;
use crate::error::ApiError;
use crate::tree::probe::NO_IDENTITY;
use crate::tree::{DirectoryTree, EntryKind, Scanner};
use crate::types::ChangeNotice;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of correlating one notification
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub notices: Vec<ChangeNotice>,
    /// Directories that started being tracked
    pub subscribe: Vec<PathBuf>,
    /// Directories that stopped being tracked
    pub unsubscribe: Vec<PathBuf>,
}

impl Correlation {
    pub fn is_empty(&self) -> bool {
        self.notices.is_empty() && self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }
}

/// Notification correlator
#[derive(Debug)]
pub struct LiveCorrelator {
    pending: PendingRenameTable,
    scanner: Scanner,
}

impl LiveCorrelator {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            pending: PendingRenameTable::new(config.max_pending_renames),
            scanner: Scanner::new(),
        }
    }

    pub fn pending(&self) -> &PendingRenameTable {
        &self.pending
    }

    /// Forget every parked removal. Called at full reconciliation.
    pub fn clear_pending(&mut self) {
        if !self.pending.is_empty() {
            info!(count = self.pending.len(), "Clearing pending renames");
        }
        self.pending.clear();
    }

    pub fn handle(
        &mut self,
        tree: &mut DirectoryTree,
        event: &FsEvent,
    ) -> Result<Correlation, ApiError> {
        if !event.path().starts_with(tree.root()) {
            return Ok(Correlation::default());
        }
        match event {
            FsEvent::Removed(path) => self.on_removed(tree, path),
            FsEvent::Created(path) => self.on_created(tree, path),
        }
    }

    fn on_removed(
        &mut self,
        tree: &mut DirectoryTree,
        path: &Path,
    ) -> Result<Correlation, ApiError> {
        let mut out = Correlation::default();

        let Some(inode) = tree.get(path).map(|n| n.inode) else {
            if tree.extensions().is_supported(path) {
                return self.on_audio_file_removed(tree, path);
            }
            return Ok(out);
        };

        let subtree = tree.detach(path)?;
        out.unsubscribe.extend(subtree.paths().map(Path::to_path_buf));
        debug!(
            path = %path.display(),
            inode,
            nodes = subtree.len(),
            "Tracked directory removed"
        );
        if inode != NO_IDENTITY {
            if let Some(evicted) = self.pending.insert(inode, subtree) {
                warn!(path = %evicted.display(), "Pending rename evicted");
            }
        }
        out.unsubscribe.extend(tree.prune_ancestors(path));
        out.notices.push(ChangeNotice::deleted(path));
        Ok(out)
    }

    fn on_audio_file_removed(
        &mut self,
        tree: &mut DirectoryTree,
        path: &Path,
    ) -> Result<Correlation, ApiError> {
        let mut out = Correlation::default();
        let Some(dir) = path.parent() else {
            return Ok(out);
        };
        if !tree.is_album_entry(dir) {
            return Ok(out);
        }
        match tree.probe().has_supported_audio(dir, tree.extensions()) {
            Ok(true) => {}
            Ok(false) => {
                if tree.demote(dir)? {
                    out.unsubscribe.push(dir.to_path_buf());
                    out.unsubscribe.extend(tree.prune_ancestors(dir));
                }
                out.notices.push(ChangeNotice::deleted(dir));
            }
            // The directory itself is going away; its own removal follows.
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Ok(out)
    }

    fn on_created(
        &mut self,
        tree: &mut DirectoryTree,
        path: &Path,
    ) -> Result<Correlation, ApiError> {
        if tree.contains(path) {
            return Ok(Correlation::default());
        }
        match tree.probe().kind(path)? {
            EntryKind::Directory => self.on_directory_created(tree, path),
            EntryKind::File if tree.extensions().is_supported(path) => {
                self.on_audio_file_created(tree, path)
            }
            EntryKind::File => Ok(Correlation::default()),
            EntryKind::Missing => {
                debug!(path = %path.display(), "Created entry vanished before correlation");
                Ok(Correlation::default())
            }
        }
    }

    fn on_directory_created(
        &mut self,
        tree: &mut DirectoryTree,
        path: &Path,
    ) -> Result<Correlation, ApiError> {
        let mut out = Correlation::default();
        let inode = tree.probe().identity(path)?;
        let untracked_ancestors: Vec<PathBuf> = path
            .ancestors()
            .skip(1)
            .take_while(|p| p.starts_with(tree.root()))
            .filter(|p| !tree.contains(p))
            .map(Path::to_path_buf)
            .collect();

        if inode != NO_IDENTITY && self.pending.contains(inode) {
            // Parked subtree stays parked unless it can be restored here.
            match tree.prepare_destination(path) {
                Ok(()) => {
                    if let Some(pending) = self.pending.take(inode) {
                        let from = pending.path;
                        let moved = pending.subtree.len();
                        tree.restore(pending.subtree, path)?;
                        out.subscribe = tracked_under(tree, path);
                        out.subscribe.extend(
                            untracked_ancestors.iter().filter(|p| tree.contains(p)).cloned(),
                        );
                        info!(
                            from = %from.display(),
                            to = %path.display(),
                            nodes = moved,
                            "Directory rename correlated"
                        );
                        out.notices.push(ChangeNotice::renamed(from, path));
                        return Ok(out);
                    }
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        inode,
                        error = %e,
                        "Cannot restore parked directory here"
                    );
                }
            }
        }

        if let Err(e) = self.scanner.calculate_into(tree, path) {
            // Nothing from a failed scan is kept or reported.
            warn!(path = %path.display(), error = %e, "Scan of created directory failed");
            if tree.contains(path) {
                tree.delete(path)?;
            }
            tree.prune_ancestors(path);
            return Ok(out);
        }
        out.subscribe = tracked_under(tree, path);
        out.subscribe
            .extend(untracked_ancestors.into_iter().filter(|p| tree.contains(p)));
        for album in tree.album_entries_under(path) {
            out.notices.push(ChangeNotice::created(album));
        }
        Ok(out)
    }

    fn on_audio_file_created(
        &mut self,
        tree: &mut DirectoryTree,
        path: &Path,
    ) -> Result<Correlation, ApiError> {
        let mut out = Correlation::default();
        let Some(dir) = path.parent() else {
            return Ok(out);
        };
        if tree.is_album_entry(dir) {
            return Ok(out);
        }
        let created = tree.add(dir)?;
        tree.mark_album_entry(dir)?;
        out.subscribe.extend(created);
        out.notices.push(ChangeNotice::created(dir));
        Ok(out)
    }
}

fn tracked_under(tree: &DirectoryTree, dir: &Path) -> Vec<PathBuf> {
    tree.paths()
        .into_iter()
        .filter(|p| p.starts_with(dir))
        .collect()
}
