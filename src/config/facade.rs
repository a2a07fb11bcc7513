//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::RepoKeeperConfig;
use crate::error::ApiError;
use std::path::{Path, PathBuf};

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the standard sources plus an optional
    /// explicit file, then apply a root override and validate.
    pub fn load(
        config_file: Option<&Path>,
        root_override: Option<PathBuf>,
    ) -> Result<RepoKeeperConfig, ApiError> {
        let mut config = MergeService::load(config_file)?;
        if let Some(root) = root_override {
            config.root_dir = Some(root);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<RepoKeeperConfig, ApiError> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
