//! Error types for the directory entry cache and the service around it.

use std::path::PathBuf;
use thiserror::Error;

/// Filesystem and snapshot storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("I/O error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Snapshot format error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Attach the offending path to an I/O error.
    pub fn at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::PathIo {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying I/O error is `NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::IoError(e) | StorageError::PathIo { source: e, .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

/// Errors surfaced by cache operations, the correlator and the command surface
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Path not found in entry cache: {}", .0.display())]
    PathNotInTree(PathBuf),

    #[error("Path is outside the library root: {}", .0.display())]
    PathOutsideRoot(PathBuf),

    #[error("Path already present in entry cache: {}", .0.display())]
    PathAlreadyInTree(PathBuf),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Scan cancelled")]
    ScanCancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Error response returned by the service for a request
    #[error("{context}: {message}")]
    RemoteError { context: String, message: String },
}

impl ApiError {
    /// Missing-path errors mean the cache and the disk disagree, which is a
    /// different failure class from I/O.
    pub fn is_cache_desync(&self) -> bool {
        matches!(
            self,
            ApiError::PathNotInTree(_) | ApiError::PathAlreadyInTree(_)
        )
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::StorageError(StorageError::IoError(e))
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(e: config::ConfigError) -> Self {
        ApiError::ConfigError(e.to_string())
    }
}

impl From<notify::Error> for ApiError {
    fn from(e: notify::Error) -> Self {
        ApiError::WatchError(e.to_string())
    }
}
