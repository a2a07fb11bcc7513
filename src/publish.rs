//! Event Publisher
//!
//! Outbound change notifications, delivered at most once. A change whose
//! delivery fails stays recorded as the node's pending modification and is
//! persisted with the next snapshot.

use crate::error::ApiError;
use crate::tree::{ChangeSet, DirectoryTree};
use crate::types::{ChangeNotice, FsChange, Modification};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Outbound notification sink
pub trait EventPublisher: Send + Sync {
    fn publish(&self, notice: &ChangeNotice) -> Result<(), ApiError>;
}

/// Fan-out publisher over a tokio broadcast channel.
///
/// Publishing with no live subscriber fails, leaving the change pending.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<ChangeNotice>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, notice: &ChangeNotice) -> Result<(), ApiError> {
        self.sender
            .send(notice.clone())
            .map(|_| ())
            .map_err(|_| ApiError::ServiceUnavailable("no notification subscriber".to_string()))
    }
}

/// Notices for every entry of a change set, in key order.
pub fn notices_from(changes: &ChangeSet) -> Vec<ChangeNotice> {
    changes
        .iter()
        .map(|(path, m)| ChangeNotice::from_modification(path, m))
        .collect()
}

/// Publish `notices` against the live `tree`.
///
/// The surviving node of each change records it as pending before the
/// attempt; success clears it. Returns the number of delivered notices.
pub fn deliver(
    tree: &mut DirectoryTree,
    notices: &[ChangeNotice],
    publisher: &dyn EventPublisher,
) -> usize {
    let mut delivered = 0;
    for notice in notices {
        let surviving = notice.surviving_path().map(|p| p.to_path_buf());
        if let Some(path) = &surviving {
            let already_pending = tree.get(path).map(|n| n.pending.is_some()).unwrap_or(true);
            if !already_pending {
                let modification = match notice.kind {
                    FsChange::Renamed => Modification {
                        change: FsChange::Renamed,
                        new_name: Some(path.clone()),
                        old_name: Some(notice.path.clone()),
                    },
                    _ => Modification::created(),
                };
                if let Err(e) = tree.set_pending_modification(path, modification) {
                    debug!(path = %path.display(), error = %e, "Could not record pending change");
                }
            }
        }

        match publisher.publish(notice) {
            Ok(()) => {
                delivered += 1;
                debug!(notice = %notice, "Change published");
                if let Some(path) = &surviving {
                    tree.clear_pending_modification(path);
                }
            }
            Err(e) => {
                warn!(notice = %notice, error = %e, "Change notification not delivered");
            }
        }
    }
    delivered
}
