//! Core types shared by the cache, the correlator and the service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub mod path_serde;

/// Inode: stable per-directory identity at a point in time
pub type Inode = u64;

/// Structural change of an album entry or one of its ancestors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsChange {
    Created,
    Renamed,
    Deleted,
}

impl fmt::Display for FsChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsChange::Created => "created",
            FsChange::Renamed => "renamed",
            FsChange::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Modification record: one per affected path.
///
/// `old_name` is only set on a pending rename carried by a node, where the
/// node is already keyed by its new path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub change: FsChange,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "path_serde::option")]
    pub new_name: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "path_serde::option")]
    pub old_name: Option<PathBuf>,
}

impl Modification {
    pub fn created() -> Self {
        Self {
            change: FsChange::Created,
            new_name: None,
            old_name: None,
        }
    }

    pub fn deleted() -> Self {
        Self {
            change: FsChange::Deleted,
            new_name: None,
            old_name: None,
        }
    }

    pub fn renamed(new_name: impl Into<PathBuf>) -> Self {
        Self {
            change: FsChange::Renamed,
            new_name: Some(new_name.into()),
            old_name: None,
        }
    }
}

/// Outbound change notification: one per structural change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub kind: FsChange,
    #[serde(with = "path_serde")]
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "path_serde::option")]
    pub new_path: Option<PathBuf>,
}

impl ChangeNotice {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsChange::Created,
            path: path.into(),
            new_path: None,
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsChange::Deleted,
            path: path.into(),
            new_path: None,
        }
    }

    pub fn renamed(path: impl Into<PathBuf>, new_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsChange::Renamed,
            path: path.into(),
            new_path: Some(new_path.into()),
        }
    }

    /// Build a notice from a diff entry keyed by `path`.
    pub fn from_modification(path: &Path, modification: &Modification) -> Self {
        Self {
            kind: modification.change,
            path: path.to_path_buf(),
            new_path: modification.new_name.clone(),
        }
    }

    /// Path of the node that still exists after this change, if any.
    pub fn surviving_path(&self) -> Option<&Path> {
        match self.kind {
            FsChange::Created => Some(&self.path),
            FsChange::Renamed => self.new_path.as_deref(),
            FsChange::Deleted => None,
        }
    }
}

impl fmt::Display for ChangeNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.new_path {
            Some(new_path) => write!(
                f,
                "dir {}: {} -> {}",
                self.kind,
                self.path.display(),
                new_path.display()
            ),
            None => write!(f, "dir {}: {}", self.kind, self.path.display()),
        }
    }
}

/// Supported audio file extensions, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Extensions(Vec<String>);

impl Extensions {
    /// Normalize to lowercase without the leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        list.sort();
        list.dedup();
        Extensions(list)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_lowercase();
                self.0.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Extensions::new([".flac", ".dsf", ".mp3", ".wv"])
    }
}

impl From<Vec<String>> for Extensions {
    fn from(v: Vec<String>) -> Self {
        Extensions::new(v)
    }
}

impl From<Extensions> for Vec<String> {
    fn from(e: Extensions) -> Self {
        e.0.into_iter().map(|ext| format!(".{}", ext)).collect()
    }
}
