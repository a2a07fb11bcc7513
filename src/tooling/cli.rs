//! CLI Tooling
//!
//! Command-line interface for RepoKeeper: the long-running service plus
//! one-shot scan, reconciliation and status commands.

use super::format::{
    format_album_entries_text, format_changes_text, format_status_text, AlbumEntryRow,
    SnapshotStatus,
};
use crate::config::{ConfigLoader, RepoKeeperConfig};
use crate::error::{ApiError, StorageError};
use crate::logging::LoggingConfig;
use crate::publish::{notices_from, BroadcastPublisher};
use crate::service::{stdio, RepoKeeper};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Notice buffer for the stdio transport
const NOTICE_CAPACITY: usize = 4096;

/// RepoKeeper CLI - audio library directory cache
#[derive(Parser)]
#[command(name = "repokeeper")]
#[command(about = "Track album directories of an audio library and report structural changes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Library root directory (overrides root_dir from config)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Configuration file path (layered over the global config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging settings from config with the CLI flags applied on top.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the service: JSON requests on stdin, answers and change notices on stdout
    Serve,
    /// Scan the library and list album entries
    Scan {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Reconcile the library against the saved snapshot and report changes
    Update {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Report changes without saving the new snapshot
        #[arg(long)]
        dry_run: bool,
    },
    /// Show saved snapshot statistics
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// CLI context for executing commands
pub struct CliContext {
    keeper: RepoKeeper,
    publisher: Arc<BroadcastPublisher>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|e| StorageError::from(e).into())
}

fn check_format(format: &str) -> Result<(), ApiError> {
    match format {
        "text" | "json" => Ok(()),
        other => Err(ApiError::ConfigError(format!(
            "Invalid output format: {} (must be 'text' or 'json')",
            other
        ))),
    }
}

impl CliContext {
    /// Create a new CLI context. A `--root` is resolved to an absolute path.
    pub fn new(root: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let root = match root {
            Some(root) => Some(dunce::canonicalize(&root).map_err(|e| StorageError::at(&root, e))?),
            None => None,
        };
        let config = ConfigLoader::load(config_path.as_deref(), root)?;
        Self::from_config(config)
    }

    pub fn from_config(config: RepoKeeperConfig) -> Result<Self, ApiError> {
        let publisher = Arc::new(BroadcastPublisher::new(NOTICE_CAPACITY));
        let keeper = RepoKeeper::new(config, publisher.clone())?;
        Ok(Self { keeper, publisher })
    }

    pub fn config(&self) -> &RepoKeeperConfig {
        self.keeper.config()
    }

    /// Execute a one-shot command.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve => Err(ApiError::ConfigError(
                "serve runs asynchronously; use CliContext::serve".to_string(),
            )),
            Commands::Scan { format } => self.scan(format),
            Commands::Update { format, dry_run } => self.update(format, *dry_run),
            Commands::Status { format } => self.status(format),
        }
    }

    fn scan(&self, format: &str) -> Result<String, ApiError> {
        check_format(format)?;
        let tree = self.keeper.scan(None)?;
        let rows: Vec<AlbumEntryRow> = tree
            .album_entries()
            .into_iter()
            .map(|path| {
                let inode = tree.get(&path).map(|n| n.inode).unwrap_or_default();
                AlbumEntryRow { path, inode }
            })
            .collect();
        if format == "json" {
            to_json(&rows)
        } else {
            Ok(format_album_entries_text(self.keeper.root(), &rows))
        }
    }

    fn update(&self, format: &str, dry_run: bool) -> Result<String, ApiError> {
        check_format(format)?;
        let (fresh, changes) = self.keeper.reconcile_blocking(None)?;
        let notices = notices_from(&changes);
        if !dry_run {
            self.keeper.store().save(&fresh)?;
            info!(path = %self.keeper.store().location().display(), "Snapshot saved");
        }
        if format == "json" {
            to_json(&notices)
        } else {
            Ok(format_changes_text(self.keeper.root(), &notices, dry_run))
        }
    }

    fn status(&self, format: &str) -> Result<String, ApiError> {
        check_format(format)?;
        let store = self.keeper.store();
        let mut status = SnapshotStatus {
            root_dir: self.keeper.root().to_path_buf(),
            snapshot_file: store.location().to_path_buf(),
            saved: false,
            saved_at: None,
            tracked_directories: 0,
            album_entries: 0,
            pending_changes: 0,
        };
        if let Some(snapshot) = store.load()? {
            status.saved = true;
            status.saved_at = snapshot.saved_at.clone();
            status.tracked_directories = snapshot.cache.len();
            status.album_entries = snapshot.cache.values().filter(|n| n.is_album_entry).count();
            status.pending_changes = snapshot.cache.values().filter(|n| n.pending.is_some()).count();
        }
        if format == "json" {
            to_json(&status)
        } else {
            Ok(format_status_text(&status))
        }
    }

    /// Run the service over stdin/stdout until input ends or ctrl-c.
    pub async fn serve(&self) -> Result<(), ApiError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let notices = self.publisher.subscribe();

        let start = self.keeper.clone().start(Arc::clone(&cancel));
        tokio::pin!(start);
        let (handle, owner) = tokio::select! {
            started = &mut start => started?,
            _ = tokio::signal::ctrl_c() => {
                cancel.store(true, Ordering::Relaxed);
                info!("Interrupted during startup scan");
                return match start.await {
                    Err(ApiError::ScanCancelled) => Ok(()),
                    Err(e) => Err(e),
                    Ok((handle, _owner)) => handle.shutdown().await,
                };
            }
        };

        tokio::select! {
            served = stdio::serve_lines(&handle, Some(notices), tokio::io::stdin(), tokio::io::stdout()) => {
                if let Err(e) = served {
                    warn!(error = %e, "Request loop stopped");
                }
            }
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }

        cancel.store(true, Ordering::Relaxed);
        let result = handle.shutdown().await;
        match owner.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Entry cache owner failed"),
            Err(e) => warn!(error = %e, "Entry cache owner panicked"),
        }
        result
    }
}
