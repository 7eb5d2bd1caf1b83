//! Subcommand implementations.

pub mod config;
pub mod extract;
pub mod notes;

use std::path::Path;

use remito_core::models::config::RemitoConfig;

/// Load the configuration from `--config`, else from the default path when
/// it exists, else the built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<RemitoConfig> {
    if let Some(path) = config_path {
        return Ok(RemitoConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(RemitoConfig::from_file(&default_path)?)
    } else {
        Ok(RemitoConfig::default())
    }
}
