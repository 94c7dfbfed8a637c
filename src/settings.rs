use anyhow::Context;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::pagination::ViewportSpec;
use crate::session::DEFAULT_CROP_CACHE_PAGES;

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Rows of the viewport reserved for the status bar
    #[serde(default = "default_reserved_height")]
    pub reserved_height: u32,

    #[serde(default = "default_crop_cache_pages")]
    pub crop_cache_pages: usize,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_viewport_width() -> u32 {
    1080
}

fn default_viewport_height() -> u32 {
    1920
}

fn default_reserved_height() -> u32 {
    100
}

fn default_crop_cache_pages() -> usize {
    DEFAULT_CROP_CACHE_PAGES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            reserved_height: default_reserved_height(),
            crop_cache_pages: default_crop_cache_pages(),
        }
    }
}

impl Settings {
    pub fn viewport(&self) -> ViewportSpec {
        ViewportSpec::new(
            self.viewport_width,
            self.viewport_height,
            self.reserved_height,
        )
    }

    /// Read settings from `path`, writing a default file if none exists.
    /// A file that fails to parse is reported and replaced by defaults in
    /// memory only, so the user's file is never clobbered.
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists() {
            let settings = Self::default();
            info!("Settings file not found, creating with defaults at {path:?}");
            if let Err(e) = settings.save(path) {
                warn!("{e:#}");
            }
            return settings;
        }

        match Self::load(path) {
            Ok(mut settings) => {
                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    if let Err(e) = settings.save(path) {
                        warn!("{e:#}");
                    }
                }
                settings
            }
            Err(e) => {
                warn!("Using default settings: {e:#}");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {path:?}"))?;
        let settings = serde_yaml::from_str::<Settings>(&content)
            .with_context(|| format!("Failed to parse settings file {path:?}"))?;
        debug!("Loaded settings from {path:?}");
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
        let content = generate_settings_yaml(self);
        fs::write(path, content).with_context(|| format!("Failed to save settings to {path:?}"))?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str("\n# Display area in pixels. Images are scaled to fill the width.\n");
    content.push_str(&format!("viewport_width: {}\n", settings.viewport_width));
    content.push_str(&format!("viewport_height: {}\n", settings.viewport_height));
    content.push_str("# Rows at the top of the screen kept for the status bar\n");
    content.push_str(&format!("reserved_height: {}\n", settings.reserved_height));
    content.push_str("\n# Cropped pages kept in memory around the current one\n");
    content.push_str(&format!("crop_cache_pages: {}\n", settings.crop_cache_pages));

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stripreader").join("config.yaml");

        let settings = Settings::load_or_create(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "viewport_width: 600\nreserved_height: 0\n").unwrap();

        let settings = Settings::load_or_create(&path);
        assert_eq!(settings.viewport(), ViewportSpec::new(600, 1920, 0));
        assert_eq!(settings.crop_cache_pages, DEFAULT_CROP_CACHE_PAGES);
    }

    #[test]
    fn test_invalid_file_is_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "viewport_width: [oops").unwrap();

        let settings = Settings::load_or_create(&path);
        assert_eq!(settings, Settings::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "viewport_width: [oops");
    }

    #[test]
    fn test_old_version_is_migrated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "version: 0\nviewport_height: 800\n").unwrap();

        let settings = Settings::load_or_create(&path);
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.viewport_height, 800);
        assert_eq!(Settings::load(&path).unwrap().version, CURRENT_VERSION);
    }
}
