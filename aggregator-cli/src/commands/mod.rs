//! CLI command implementations

pub mod doctor;
pub mod identity;
pub mod migrate;

use std::path::PathBuf;

use aggregator_core::config::Config;
use aggregator_core::AggregatorContext;
use anyhow::{anyhow, Context, Result};

/// Get the data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("AGGREGATOR_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".aggregator"))
        .ok_or_else(|| anyhow!("Could not find home directory; set AGGREGATOR_DIR"))
}

/// Load the config from the data directory
pub fn get_config() -> Result<Config> {
    let data_dir = get_data_dir()?;
    tracing::debug!(data_dir = %data_dir.display(), "loading settings");

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    let config = Config::load(&data_dir)
        .with_context(|| format!("Failed to load settings from {:?}", data_dir))?;
    Ok(config)
}

/// Open the context without migrating, so commands decide what happens to
/// the schema
pub fn get_context() -> Result<AggregatorContext> {
    let mut config = get_config()?;
    config.auto_migrate = false;

    AggregatorContext::with_config(config).context("Failed to initialize aggregator context")
}
