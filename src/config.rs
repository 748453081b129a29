// src/config.rs

//! Configuration loading utilities.

use std::path::Path;

use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load configuration from a TOML file.
///
/// A missing file falls back to defaults; a file that exists but does not
/// parse is an error. Environment overrides are applied last.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        info!("Loading config from {}", path.display());
        Config::load(path)?
    } else {
        warn!("Config file {} not found, using defaults", path.display());
        Config::default()
    };
    config.apply_env();
    Ok(config)
}

/// Load, then reject configurations that cannot work.
pub fn load_validated(path: &Path) -> Result<Config> {
    let config = load_config(path)?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config {}: {e}", path.display())))?;
    Ok(config)
}
