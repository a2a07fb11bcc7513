//! Filesystem probe: directory identity and entry kind lookups
//!
//! Identity is the inode number on unix. Rename detection in both the diff
//! engine and the live correlator depends on it; on targets without stable
//! per-directory identifiers every directory reports identity 0, which never
//! matches, so renames degrade to delete+create pairs.

use crate::error::StorageError;
use crate::types::{Extensions, Inode};
use std::fmt;
use std::path::Path;

/// Identity value meaning "no stable identity available"
pub const NO_IDENTITY: Inode = 0;

/// Kind of a filesystem entry at probe time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Missing,
}

/// Filesystem probe interface
pub trait FsProbe: fmt::Debug + Send + Sync {
    /// Stable identity of the directory at `path`.
    fn identity(&self, path: &Path) -> Result<Inode, StorageError>;

    /// Kind of the entry at `path`; a vanished path is `Missing`, not an error.
    fn kind(&self, path: &Path) -> Result<EntryKind, StorageError>;

    /// Whether `dir` directly contains at least one supported audio file.
    fn has_supported_audio(&self, dir: &Path, extensions: &Extensions)
        -> Result<bool, StorageError>;
}

/// Probe backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        SystemProbe
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Inode {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Inode {
    NO_IDENTITY
}

impl FsProbe for SystemProbe {
    fn identity(&self, path: &Path) -> Result<Inode, StorageError> {
        let metadata = std::fs::metadata(path).map_err(|e| StorageError::at(path, e))?;
        Ok(inode_of(&metadata))
    }

    fn kind(&self, path: &Path) -> Result<EntryKind, StorageError> {
        match std::fs::symlink_metadata(path) {
            Ok(m) if m.is_dir() => Ok(EntryKind::Directory),
            Ok(_) => Ok(EntryKind::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EntryKind::Missing),
            Err(e) => Err(StorageError::at(path, e)),
        }
    }

    fn has_supported_audio(
        &self,
        dir: &Path,
        extensions: &Extensions,
    ) -> Result<bool, StorageError> {
        let entries = std::fs::read_dir(dir).map_err(|e| StorageError::at(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::at(dir, e))?;
            let file_type = entry.file_type().map_err(|e| StorageError::at(entry.path(), e))?;
            if file_type.is_file() && extensions.is_supported(&entry.path()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
