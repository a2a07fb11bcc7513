//! Format scan results, changes and snapshot status as text.

use crate::types::{path_serde, ChangeNotice, FsChange};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Row of the album entry listing
#[derive(Debug, Clone, Serialize)]
pub struct AlbumEntryRow {
    #[serde(serialize_with = "path_serde::serialize")]
    pub path: PathBuf,
    pub inode: u64,
}

/// Saved snapshot summary
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStatus {
    #[serde(serialize_with = "path_serde::serialize")]
    pub root_dir: PathBuf,
    #[serde(serialize_with = "path_serde::serialize")]
    pub snapshot_file: PathBuf,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    pub tracked_directories: usize,
    pub album_entries: usize,
    pub pending_changes: usize,
}

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn display_relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

pub fn format_album_entries_text(root: &Path, rows: &[AlbumEntryRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Album entries")));
    out.push_str(&format!("  Root: {}\n\n", root.display()));
    if rows.is_empty() {
        out.push_str("No album entries found.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Album entry", "Inode"]);
    for row in rows {
        table.add_row(vec![display_relative(&row.path, root), row.inode.to_string()]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!("Total: {} album entries.\n", rows.len()));
    out
}

pub fn format_changes_text(root: &Path, changes: &[ChangeNotice], dry_run: bool) -> String {
    let mut out = String::new();
    let title = if dry_run {
        "Changes since last snapshot (dry run)"
    } else {
        "Changes since last snapshot"
    };
    out.push_str(&format!("{}\n\n", format_section_heading(title)));
    if changes.is_empty() {
        out.push_str("No changes.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Change", "Path", "New path"]);
    for change in changes {
        let kind = match change.kind {
            FsChange::Created => "created",
            FsChange::Renamed => "renamed",
            FsChange::Deleted => "deleted",
        };
        table.add_row(vec![
            kind.to_string(),
            display_relative(&change.path, root),
            change
                .new_path
                .as_deref()
                .map(|p| display_relative(p, root))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!("Total: {} changes.\n", changes.len()));
    out
}

pub fn format_status_text(status: &SnapshotStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Library Status")));
    out.push_str(&format!("  Root: {}\n", status.root_dir.display()));
    out.push_str(&format!("  Snapshot: {}\n", status.snapshot_file.display()));
    if !status.saved {
        out.push_str("  Saved: no\n\nRun `repokeeper update` or `repokeeper serve` to create it.\n");
        return out;
    }
    if let Some(saved_at) = &status.saved_at {
        out.push_str(&format!("  Saved at: {}\n", saved_at));
    }
    out.push_str(&format!("  Tracked directories: {}\n", status.tracked_directories));
    out.push_str(&format!("  Album entries: {}\n", status.album_entries));
    out.push_str(&format!("  Undelivered changes: {}\n", status.pending_changes));
    out
}
