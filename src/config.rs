//! Configuration Management
//!
//! Layered configuration loaded with the `config` crate. Precedence, lowest
//! first: built-in defaults, `$XDG_CONFIG_HOME/repokeeper/config.toml`, an
//! explicit `--config` file, `REPOKEEPER__*` environment variables.

mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::types::Extensions;
use crate::watch::WatchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoKeeperConfig {
    /// Absolute path of the library root
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Supported audio extensions; case-insensitive, leading dot optional
    #[serde(default)]
    pub extensions: Extensions,

    /// Snapshot location; defaults to the per-library data directory
    #[serde(default)]
    pub snapshot_file: Option<PathBuf>,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RepoKeeperConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        match &self.root_dir {
            None => {
                return Err(ApiError::ConfigError(
                    "root_dir is not set (use --root or REPOKEEPER__ROOT_DIR)".to_string(),
                ))
            }
            Some(root) if !root.is_absolute() => {
                return Err(ApiError::ConfigError(format!(
                    "root_dir must be absolute: {}",
                    root.display()
                )))
            }
            Some(_) => {}
        }
        if self.extensions.is_empty() {
            return Err(ApiError::ConfigError(
                "extensions must list at least one audio extension".to_string(),
            ));
        }
        if self.watch.max_pending_renames == 0 {
            return Err(ApiError::ConfigError(
                "watch.max_pending_renames must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Library root; errors when unset.
    pub fn root(&self) -> Result<&Path, ApiError> {
        self.root_dir
            .as_deref()
            .ok_or_else(|| ApiError::ConfigError("root_dir is not set".to_string()))
    }

    /// Configured snapshot file, or `cache.json` in the library data dir.
    pub fn snapshot_path(&self) -> Result<PathBuf, ApiError> {
        match &self.snapshot_file {
            Some(path) => Ok(path.clone()),
            None => Ok(paths::xdg_root::library_data_dir(self.root()?)?.join("cache.json")),
        }
    }
}
