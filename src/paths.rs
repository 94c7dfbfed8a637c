use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "stripreader";
const SETTINGS_FILENAME: &str = "config.yaml";
const PREFERENCES_FILENAME: &str = "preferences.json";
const LOG_FILENAME: &str = "stripreader.log";

pub fn settings_path() -> Result<PathBuf> {
    let config = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Preferences and reading positions, shared by every image
pub fn preferences_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("Could not determine data directory")?
        .join(APP_NAME);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {data_dir:?}"))?;
    Ok(data_dir.join(PREFERENCES_FILENAME))
}

/// Uses `state_dir` on platforms that have it, falls back to `cache_dir`.
pub fn log_path() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine state or cache directory")?;

    let log_dir = base.join(APP_NAME);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir:?}"))?;

    Ok(log_dir.join(LOG_FILENAME))
}
