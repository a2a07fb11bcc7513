//! Tooling & Integration Layer
//!
//! CLI front end and text formatting of library state.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
