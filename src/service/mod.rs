//! RepoKeeper service
//!
//! Startup order is strict: scan the library, reconcile against the saved
//! snapshot and deliver the differences, register watches, then hand the tree
//! to the owner task that serves notifications and commands.

pub mod commands;
pub mod owner;
pub mod stdio;

pub use commands::{ErrorResponse, ServiceInfo, ServiceRequest, ServiceResponse};
pub use owner::{CacheHandle, CacheMessage, EntryCacheOwner};

use crate::config::RepoKeeperConfig;
use crate::error::ApiError;
use crate::publish::{deliver, notices_from, EventPublisher};
use crate::store::{JsonSnapshotStore, SnapshotStore};
use crate::tree::{compare, ChangeSet, DirectoryTree, FsProbe, Scanner, SystemProbe};
use crate::watch::{EventReceiver, NotifyRegistry, WatchRegistry};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const CONTROL_QUEUE_DEPTH: usize = 64;

/// Service assembly: configuration plus the collaborators the owner needs
#[derive(Clone)]
pub struct RepoKeeper {
    config: RepoKeeperConfig,
    root: PathBuf,
    probe: Arc<dyn FsProbe>,
    store: Arc<dyn SnapshotStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl RepoKeeper {
    pub fn new(
        config: RepoKeeperConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        let root = config.root()?.to_path_buf();
        let store = Arc::new(JsonSnapshotStore::new(config.snapshot_path()?));
        Ok(Self {
            config,
            root,
            probe: Arc::new(SystemProbe::new()),
            store,
            publisher,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn FsProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoKeeperConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Empty tree for this library.
    pub fn new_tree(&self) -> DirectoryTree {
        DirectoryTree::new(
            self.root.clone(),
            self.config.extensions.clone(),
            Arc::clone(&self.probe),
        )
    }

    /// Walk the library into a fresh tree.
    pub fn scan(&self, cancel: Option<Arc<AtomicBool>>) -> Result<DirectoryTree, ApiError> {
        let mut scanner = Scanner::new();
        if let Some(flag) = cancel {
            scanner = scanner.with_cancel(flag);
        }
        let mut tree = self.new_tree();
        scanner.calculate(&mut tree)?;
        Ok(tree)
    }

    /// Tree from the saved snapshot. Missing, unreadable, corrupt or foreign
    /// snapshots all mean "no previous session".
    pub fn previous_tree(&self) -> Option<DirectoryTree> {
        let location = self.store.location().to_path_buf();
        match self.store.load() {
            Ok(Some(snapshot)) if snapshot.is_foreign(&self.root) => {
                warn!(
                    path = %location.display(),
                    saved_root = ?snapshot.root_dir,
                    "Ignoring snapshot of another library"
                );
                None
            }
            Ok(Some(snapshot)) => Some(snapshot.into_tree(
                &self.root,
                self.config.extensions.clone(),
                Arc::clone(&self.probe),
            )),
            Ok(None) => {
                info!(path = %location.display(), "No previous snapshot");
                None
            }
            Err(e) => {
                warn!(path = %location.display(), error = %e, "Snapshot unreadable, starting fresh");
                None
            }
        }
    }

    /// Scan and compare against the previous session, without delivering.
    pub fn reconcile_blocking(
        &self,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<(DirectoryTree, ChangeSet), ApiError> {
        let fresh = self.scan(cancel)?;
        let changes = match self.previous_tree() {
            Some(old) => compare(&fresh, &old),
            None => ChangeSet::new(),
        };
        info!(
            album_entries = fresh.album_entries().len(),
            changes = changes.len(),
            "Offline reconciliation finished"
        );
        Ok((fresh, changes))
    }

    /// [`Self::reconcile_blocking`] on the blocking pool.
    pub async fn reconcile(
        &self,
        cancel: Arc<AtomicBool>,
    ) -> Result<(DirectoryTree, ChangeSet), ApiError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.reconcile_blocking(Some(cancel)))
            .await
            .map_err(|e| ApiError::ServiceUnavailable(format!("scan task failed: {}", e)))?
    }

    /// Start with platform watches.
    pub async fn start(
        self,
        cancel: Arc<AtomicBool>,
    ) -> Result<(CacheHandle, JoinHandle<Result<(), ApiError>>), ApiError> {
        let tree = self.reconcile_and_deliver(Arc::clone(&cancel)).await?;
        let (registry, events) = NotifyRegistry::start(&self.root, &self.config.watch)?;
        self.spawn_owner(tree, Box::new(registry), events, cancel)
    }

    /// Start with a caller-supplied registry and notification stream.
    pub async fn start_with(
        self,
        cancel: Arc<AtomicBool>,
        registry: Box<dyn WatchRegistry>,
        events: EventReceiver,
    ) -> Result<(CacheHandle, JoinHandle<Result<(), ApiError>>), ApiError> {
        let tree = self.reconcile_and_deliver(Arc::clone(&cancel)).await?;
        self.spawn_owner(tree, registry, events, cancel)
    }

    async fn reconcile_and_deliver(&self, cancel: Arc<AtomicBool>) -> Result<DirectoryTree, ApiError> {
        let (mut tree, changes) = self.reconcile(cancel).await?;
        let notices = notices_from(&changes);
        let delivered = deliver(&mut tree, &notices, self.publisher.as_ref());
        if delivered < notices.len() {
            warn!(
                undelivered = notices.len() - delivered,
                "Changes between sessions left pending"
            );
        }
        Ok(tree)
    }

    fn spawn_owner(
        self,
        tree: DirectoryTree,
        mut registry: Box<dyn WatchRegistry>,
        events: EventReceiver,
        cancel: Arc<AtomicBool>,
    ) -> Result<(CacheHandle, JoinHandle<Result<(), ApiError>>), ApiError> {
        registry.sync(&tree)?;
        info!(watched = registry.watched().len(), "Watches registered");

        let (sender, control) = mpsc::channel(CONTROL_QUEUE_DEPTH);
        let owner = EntryCacheOwner::new(
            tree,
            &self.config.watch,
            registry,
            self.publisher,
            self.store,
            cancel,
        );
        let task = tokio::spawn(owner.run(control, events));
        Ok((CacheHandle::new(sender), task))
    }
}
