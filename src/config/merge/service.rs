//! MergeService: orchestrates sources, applies merge policy, deserializes to RepoKeeperConfig.

use crate::config::sources::{environment, global_file};
use crate::config::RepoKeeperConfig;
use config::{ConfigError, File};
use std::path::Path;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> explicit file ->
    /// environment (highest).
    pub fn load(explicit_file: Option<&Path>) -> Result<RepoKeeperConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit_file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load a single file with the environment overlay, skipping the global
    /// file.
    pub fn load_from_file(path: &Path) -> Result<RepoKeeperConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(environment::source());

        builder.build()?.try_deserialize()
    }
}
