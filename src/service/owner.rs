//! Single-owner cache task
//!
//! [`EntryCacheOwner`] holds the directory tree exclusively. Filesystem
//! notifications and commands reach it as messages, so every tree access is
//! serialized through one task.

use super::commands::{ServiceInfo, ServiceRequest, ServiceResponse, DISPATCHER_CONTEXT};
use crate::error::ApiError;
use crate::publish::{deliver, notices_from, EventPublisher};
use crate::store::SnapshotStore;
use crate::tree::{compare, DirectoryTree, Scanner};
use crate::watch::{convert_event, EventReceiver, FsEvent, LiveCorrelator, WatchConfig, WatchRegistry};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Message accepted by the owner task
#[derive(Debug)]
pub enum CacheMessage {
    Command {
        request: ServiceRequest,
        reply: oneshot::Sender<ServiceResponse>,
    },
    /// Save the snapshot now
    Flush {
        reply: oneshot::Sender<Result<(), ApiError>>,
    },
    /// Save the snapshot and stop
    Shutdown {
        reply: oneshot::Sender<Result<(), ApiError>>,
    },
}

/// Cloneable handle to the owner task
#[derive(Debug, Clone)]
pub struct CacheHandle {
    sender: mpsc::Sender<CacheMessage>,
}

fn owner_gone() -> ApiError {
    ApiError::ServiceUnavailable("entry cache task has stopped".to_string())
}

impl CacheHandle {
    pub(crate) fn new(sender: mpsc::Sender<CacheMessage>) -> Self {
        Self { sender }
    }

    pub async fn request(&self, request: ServiceRequest) -> Result<ServiceResponse, ApiError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(CacheMessage::Command { request, reply })
            .await
            .map_err(|_| owner_gone())?;
        rx.await.map_err(|_| owner_gone())
    }

    /// Parse and run one raw JSON request. Never fails: every problem is
    /// turned into an error answer.
    pub async fn dispatch_raw(&self, payload: &str) -> ServiceResponse {
        let request = match super::commands::parse_request(payload) {
            Ok(request) => request,
            Err(answer) => {
                warn!(payload, "Malformed request");
                return answer;
            }
        };
        match self.request(request.clone()).await {
            Ok(response) => response,
            Err(e) => ServiceResponse::failure(&request, &e, DISPATCHER_CONTEXT),
        }
    }

    pub async fn flush(&self) -> Result<(), ApiError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(CacheMessage::Flush { reply })
            .await
            .map_err(|_| owner_gone())?;
        rx.await.map_err(|_| owner_gone())?
    }

    pub async fn shutdown(&self) -> Result<(), ApiError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(CacheMessage::Shutdown { reply })
            .await
            .map_err(|_| owner_gone())?;
        rx.await.map_err(|_| owner_gone())?
    }
}

/// Exclusive owner of the live tree
pub struct EntryCacheOwner {
    tree: DirectoryTree,
    correlator: LiveCorrelator,
    registry: Box<dyn WatchRegistry>,
    publisher: Arc<dyn EventPublisher>,
    store: Arc<dyn SnapshotStore>,
    cancel: Arc<AtomicBool>,
}

impl EntryCacheOwner {
    pub fn new(
        tree: DirectoryTree,
        watch: &WatchConfig,
        registry: Box<dyn WatchRegistry>,
        publisher: Arc<dyn EventPublisher>,
        store: Arc<dyn SnapshotStore>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            tree,
            correlator: LiveCorrelator::new(watch),
            registry,
            publisher,
            store,
            cancel,
        }
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    /// Serve messages and notifications until shutdown or until every
    /// handle is dropped. The snapshot is saved on the way out.
    pub async fn run(
        mut self,
        mut control: mpsc::Receiver<CacheMessage>,
        mut events: EventReceiver,
    ) -> Result<(), ApiError> {
        info!(root = %self.tree.root().display(), "Entry cache owner started");
        let mut events_open = true;

        loop {
            tokio::select! {
                message = control.recv() => match message {
                    Some(CacheMessage::Command { request, reply }) => {
                        let response = self.handle_command(request).await;
                        if reply.send(response).is_err() {
                            debug!("Requester went away before the answer");
                        }
                    }
                    Some(CacheMessage::Flush { reply }) => {
                        let _ = reply.send(self.save());
                    }
                    Some(CacheMessage::Shutdown { reply }) => {
                        let result = self.save();
                        let _ = reply.send(result);
                        info!("Entry cache owner stopped");
                        return Ok(());
                    }
                    None => break,
                },
                event = events.recv(), if events_open => match event {
                    Some(Ok(event)) => {
                        for fs_event in convert_event(event) {
                            self.apply(&fs_event);
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Watch error"),
                    None => {
                        warn!("Notification source closed");
                        events_open = false;
                    }
                },
            }
        }

        let result = self.save();
        info!("Entry cache owner stopped");
        result
    }

    /// Correlate one notification against the live tree and deliver what it
    /// produced.
    pub fn apply(&mut self, event: &FsEvent) {
        debug!(event = ?event, "Filesystem event");
        match self.correlator.handle(&mut self.tree, event) {
            Ok(correlation) => {
                for path in &correlation.unsubscribe {
                    if let Err(e) = self.registry.unsubscribe(path) {
                        debug!(path = %path.display(), error = %e, "Unsubscribe failed");
                    }
                }
                for path in &correlation.subscribe {
                    if let Err(e) = self.registry.subscribe(path) {
                        warn!(path = %path.display(), error = %e, "Subscribe failed");
                    }
                }
                deliver(&mut self.tree, &correlation.notices, self.publisher.as_ref());
            }
            Err(e) if e.is_cache_desync() => {
                warn!(path = %event.path().display(), error = %e, "Entry cache out of sync with disk");
            }
            Err(e) => {
                error!(path = %event.path().display(), error = %e, "Failed to apply filesystem event");
            }
        }
    }

    async fn handle_command(&mut self, request: ServiceRequest) -> ServiceResponse {
        match &request.path {
            Some(path) => info!(cmd = %request.cmd, path = %path.display(), "Request"),
            None => info!(cmd = %request.cmd, "Request"),
        }
        match request.cmd.as_str() {
            "ping" => ServiceResponse::ok(&request),
            "info" => ServiceResponse {
                info: Some(self.info()),
                ..ServiceResponse::ok(&request)
            },
            "update" => match self.update(request.full).await {
                Ok(mut response) => {
                    response.cmd = request.cmd.clone();
                    response.correlation_id = request.correlation_id.clone();
                    response
                }
                Err(e) => {
                    error!(error = %e, "Update failed");
                    ServiceResponse::failure(&request, &e, &request.cmd)
                }
            },
            "normalize" => ServiceResponse::failure(
                &request,
                &ApiError::NotImplemented("normalize".to_string()),
                &request.cmd,
            ),
            other => {
                warn!(cmd = other, "Unknown command");
                ServiceResponse::failure(
                    &request,
                    &ApiError::UnknownCommand(other.to_string()),
                    DISPATCHER_CONTEXT,
                )
            }
        }
    }

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            root_dir: self.tree.root().to_path_buf(),
            tracked_directories: self.tree.len(),
            album_entries: self.tree.album_entries().len(),
            pending_changes: self.tree.pending_count(),
            pending_renames: self.correlator.pending().len(),
            snapshot_file: Some(self.store.location().to_path_buf()),
        }
    }

    /// Full rescan compared against the live tree. The fresh tree replaces
    /// the live one only when the scan succeeds.
    async fn update(&mut self, full: bool) -> Result<ServiceResponse, ApiError> {
        let mut fresh = self.tree.empty_like();
        let scanner = Scanner::new().with_cancel(Arc::clone(&self.cancel));
        let fresh = tokio::task::spawn_blocking(move || scanner.calculate(&mut fresh).map(|_| fresh))
            .await
            .map_err(|e| ApiError::ServiceUnavailable(format!("scan task failed: {}", e)))??;

        let changes = compare(&fresh, &self.tree);
        info!(changes = changes.len(), "Update reconciled live tree");
        self.tree = fresh;
        self.correlator.clear_pending();
        self.registry.sync(&self.tree)?;

        let notices = notices_from(&changes);
        deliver(&mut self.tree, &notices, self.publisher.as_ref());

        let mut response = ServiceResponse::default();
        if full {
            response.snapshot = Some(
                self.tree
                    .nodes()
                    .iter()
                    .map(|(p, n)| (p.clone(), n.clone()))
                    .collect::<BTreeMap<_, _>>(),
            );
        } else {
            response.changes = Some(notices);
        }
        Ok(response)
    }

    fn save(&self) -> Result<(), ApiError> {
        match self.store.save(&self.tree) {
            Ok(()) => {
                info!(
                    path = %self.store.location().display(),
                    nodes = self.tree.len(),
                    "Snapshot saved"
                );
                Ok(())
            }
            Err(e) => {
                error!(path = %self.store.location().display(), error = %e, "Snapshot save failed");
                Err(e)
            }
        }
    }
}
