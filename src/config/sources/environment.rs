//! Environment variable source: SNAPFS_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `SNAPFS_FILESYSTEM__OVERWRITE=reject` sets `filesystem.overwrite`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix("SNAPFS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    ))
}
