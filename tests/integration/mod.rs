//! Integration tests for the RepoKeeper directory cache and service

mod cli_parse;
mod live_correlation;
mod reconciliation;
mod service_commands;
mod tree_structure;

use repokeeper::config::RepoKeeperConfig;
use repokeeper::publish::BroadcastPublisher;
use repokeeper::service::RepoKeeper;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Temp dir holding `music/` (the library root) and `state/` (snapshot).
pub(crate) struct Library {
    _temp: TempDir,
    pub root: PathBuf,
    pub snapshot: PathBuf,
}

impl Library {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("music");
        fs::create_dir_all(&root).unwrap();
        let snapshot = temp.path().join("state").join("cache.json");
        Self {
            _temp: temp,
            root,
            snapshot,
        }
    }

    /// Create `rel` (and parents) under the root with one file per name.
    pub fn album(&self, rel: &str, files: &[&str]) -> PathBuf {
        let dir = self.root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        for name in files {
            fs::write(dir.join(name), b"audio").unwrap();
        }
        dir
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn config(&self) -> RepoKeeperConfig {
        let mut config = RepoKeeperConfig::with_root(&self.root);
        config.snapshot_file = Some(self.snapshot.clone());
        config
    }

    pub fn keeper(&self, publisher: Arc<BroadcastPublisher>) -> RepoKeeper {
        RepoKeeper::new(self.config(), publisher).unwrap()
    }
}
