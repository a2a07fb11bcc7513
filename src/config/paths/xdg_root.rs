//! XDG Base Directory utilities for per-library data.

use crate::error::ApiError;
use std::path::{Component, Path, PathBuf};

/// Get XDG data home directory
///
/// Returns `$XDG_DATA_HOME` if set, otherwise defaults to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data_home.is_empty() {
            return Some(PathBuf::from(xdg_data_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// `base` extended with the normal components of `library_root`.
///
/// `/srv/music` under `base` becomes `base/srv/music`.
pub fn scoped_dir(base: &Path, library_root: &Path) -> PathBuf {
    let mut dir = base.to_path_buf();
    for component in library_root.components() {
        if let Component::Normal(name) = component {
            dir.push(name);
        }
    }
    dir
}

/// Data directory for one library: `$XDG_DATA_HOME/repokeeper/<root path>/`
pub fn library_data_dir(library_root: &Path) -> Result<PathBuf, ApiError> {
    let data_home = data_home().ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(scoped_dir(&data_home.join("repokeeper"), library_root))
}

/// Global config file: `$XDG_CONFIG_HOME/repokeeper/config.toml`
pub fn global_config_file() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join("repokeeper").join("config.toml"))
}
