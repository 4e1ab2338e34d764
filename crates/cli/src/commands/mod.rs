//! Command implementations.

mod info;
mod simulate;
mod validate;

pub use info::run_info;
pub use simulate::run_simulate;
pub use validate::run_validate;

use anyhow::{Context, Result};
use contracts::PlaybackConfig;
use std::path::Path;

use crate::error::CliError;

/// Load a configuration file, failing early with a clear message if it is missing
fn load_config(path: &Path) -> Result<PlaybackConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
