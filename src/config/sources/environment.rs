//! Environment variable source: REPOKEEPER_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
///
/// `REPOKEEPER__WATCH__RECURSIVE=false` sets `watch.recursive`;
/// `REPOKEEPER__EXTENSIONS=flac,mp3` is split on commas.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(source()))
}

pub(crate) fn source() -> Environment {
    Environment::with_prefix("REPOKEEPER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("extensions")
}
