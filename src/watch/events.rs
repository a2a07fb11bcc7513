//! Watch events and configuration.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

fn default_max_pending_renames() -> usize {
    1024
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Watch the root recursively instead of registering one watch per
    /// tracked directory
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Upper bound of removed directories awaiting a matching create
    #[serde(default = "default_max_pending_renames")]
    pub max_pending_renames: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: default_true(),
            max_pending_renames: default_max_pending_renames(),
        }
    }
}

/// Filesystem notification reduced to the two phases the correlator needs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FsEvent {
    Created(PathBuf),
    Removed(PathBuf),
}

impl FsEvent {
    pub fn path(&self) -> &std::path::Path {
        match self {
            FsEvent::Created(p) | FsEvent::Removed(p) => p,
        }
    }
}

/// Convert a notify event into correlator input, preserving path order.
///
/// `Name(Both)` is dropped: backends that report it also deliver the `From`
/// and `To` halves separately.
pub fn convert_event(event: Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.into_iter().map(FsEvent::Created).collect()
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.into_iter().map(FsEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Other)) => event
            .paths
            .into_iter()
            .map(|p| {
                if std::fs::symlink_metadata(&p).is_ok() {
                    FsEvent::Created(p)
                } else {
                    FsEvent::Removed(p)
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}
