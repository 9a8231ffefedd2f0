//! ConfigLoader facade over the layered sources.

use super::layering::builder_with_defaults;
use super::sources::{environment, global_file};
use super::SnapfsConfig;
use crate::error::ConfigError;
use config::File;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the global config file and the environment.
    pub fn load() -> Result<SnapfsConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = environment::add_to_builder(builder)?;
        Self::finish(builder.build()?)
    }

    /// Load defaults, then `path`, then the environment. The file must exist.
    pub fn load_from_file(path: &Path) -> Result<SnapfsConfig, ConfigError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder)?;
        Self::finish(builder.build()?)
    }

    fn finish(raw: config::Config) -> Result<SnapfsConfig, ConfigError> {
        let config: SnapfsConfig = raw.try_deserialize()?;
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ConfigError::Invalid(messages.join("\n"))
        })?;
        Ok(config)
    }
}
