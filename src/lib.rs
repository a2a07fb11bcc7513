//! RepoKeeper: audio library directory cache
//!
//! Tracks album entry directories (directories directly holding supported
//! audio files) and their ancestors in a path-keyed tree, reconciles the
//! tree against the previous session's snapshot, and turns live filesystem
//! notifications into created, renamed and deleted changes.

pub mod config;
pub mod error;
pub mod logging;
pub mod publish;
pub mod service;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod watch;
