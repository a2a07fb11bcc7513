//! Watch registration and the notify bridge.

use super::events::WatchConfig;
use crate::error::ApiError;
use crate::tree::DirectoryTree;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Raw notification stream handed to the cache owner
pub type EventReceiver = mpsc::UnboundedReceiver<notify::Result<Event>>;
pub type EventSender = mpsc::UnboundedSender<notify::Result<Event>>;

/// Directory watch subscriptions
pub trait WatchRegistry: Send {
    fn subscribe(&mut self, path: &Path) -> Result<(), ApiError>;
    fn unsubscribe(&mut self, path: &Path) -> Result<(), ApiError>;

    /// Bring subscriptions in line with the tracked directories of `tree`.
    fn sync(&mut self, tree: &DirectoryTree) -> Result<(), ApiError> {
        let wanted: BTreeSet<PathBuf> = tree.paths().into_iter().collect();
        let current: BTreeSet<PathBuf> = self.watched().into_iter().collect();
        for stale in current.difference(&wanted) {
            if let Err(e) = self.unsubscribe(stale) {
                debug!(path = %stale.display(), error = %e, "Unsubscribe failed");
            }
        }
        for path in wanted.difference(&current) {
            if let Err(e) = self.subscribe(path) {
                warn!(path = %path.display(), error = %e, "Subscribe failed");
            }
        }
        Ok(())
    }

    fn watched(&self) -> Vec<PathBuf>;
}

/// Registry backed by the platform watcher.
///
/// In recursive mode a single watch on the root covers the library and the
/// per-directory calls only keep bookkeeping. Otherwise every tracked
/// directory gets its own non-recursive watch.
pub struct NotifyRegistry {
    watcher: RecommendedWatcher,
    root: PathBuf,
    recursive: bool,
    watched: BTreeSet<PathBuf>,
}

impl NotifyRegistry {
    pub fn start(root: &Path, config: &WatchConfig) -> Result<(Self, EventReceiver), ApiError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res| {
            if tx.send(res).is_err() {
                error!("Watch event receiver dropped");
            }
        })
        .map_err(|e| ApiError::WatchError(format!("Failed to create watcher: {}", e)))?;

        let mut registry = Self {
            watcher,
            root: root.to_path_buf(),
            recursive: config.recursive,
            watched: BTreeSet::new(),
        };
        if registry.recursive {
            registry
                .watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| ApiError::WatchError(format!("Failed to watch {}: {}", root.display(), e)))?;
        }
        info!(root = %root.display(), recursive = registry.recursive, "Watching library");
        Ok((registry, rx))
    }
}

impl std::fmt::Debug for NotifyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyRegistry")
            .field("root", &self.root)
            .field("recursive", &self.recursive)
            .field("watched", &self.watched.len())
            .finish()
    }
}

impl WatchRegistry for NotifyRegistry {
    fn subscribe(&mut self, path: &Path) -> Result<(), ApiError> {
        if self.watched.contains(path) {
            return Ok(());
        }
        if !self.recursive {
            self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        }
        debug!(path = %path.display(), "Subscribed");
        self.watched.insert(path.to_path_buf());
        Ok(())
    }

    fn unsubscribe(&mut self, path: &Path) -> Result<(), ApiError> {
        if !self.watched.remove(path) {
            return Ok(());
        }
        debug!(path = %path.display(), "Unsubscribed");
        if !self.recursive {
            // The watch is already gone when the directory was removed.
            if let Err(e) = self.watcher.unwatch(path) {
                debug!(path = %path.display(), error = %e, "Unwatch failed");
            }
        }
        Ok(())
    }

    fn watched(&self) -> Vec<PathBuf> {
        self.watched.iter().cloned().collect()
    }
}

/// Bookkeeping-only registry; notifications are injected by the caller.
///
/// Clones share their subscription set, so a copy kept outside the cache
/// owner observes what the owner subscribed.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    watched: Arc<RwLock<BTreeSet<PathBuf>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry plus a sender for feeding notifications by hand.
    pub fn channel() -> (Self, EventSender, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(), tx, rx)
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.read().contains(path)
    }
}

impl WatchRegistry for MemoryRegistry {
    fn subscribe(&mut self, path: &Path) -> Result<(), ApiError> {
        self.watched.write().insert(path.to_path_buf());
        Ok(())
    }

    fn unsubscribe(&mut self, path: &Path) -> Result<(), ApiError> {
        self.watched.write().remove(path);
        Ok(())
    }

    fn watched(&self) -> Vec<PathBuf> {
        self.watched.read().iter().cloned().collect()
    }
}
