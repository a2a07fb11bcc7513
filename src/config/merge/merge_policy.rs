//! Built-in defaults, the lowest-precedence layer.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

pub(crate) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("extensions", vec![".flac", ".dsf", ".mp3", ".wv"])?
        .set_default("watch.recursive", true)?
        .set_default("watch.max_pending_renames", 1024_i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
