//! # Configuration Module
//!
//! Handles the application configuration file and the well-known directories.
//!
//! ## Configuration Storage
//! Configuration is stored as JSON in:
//! `~/.config/cosmic-wallhaven-wallpaper/config.json`
//!
//! The user's wallpaper choices and favorites are *not* kept here; they live in
//! the settings blob managed by [`crate::settings`], next to this file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::SearchQuery;

/// Directory name used under the platform config and data roots.
pub const APP_DIR_NAME: &str = "cosmic-wallhaven-wallpaper";

/// Default Wallhaven API root.
pub const DEFAULT_API_BASE_URL: &str = "https://wallhaven.cc/api/v1";

/// Returns `~/.config/cosmic-wallhaven-wallpaper`.
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR_NAME))
}

/// Returns the default wallpaper storage directory
/// (`~/.local/share/cosmic-wallhaven-wallpaper/Wallpapers`).
fn default_wallpaper_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR_NAME)
        .join("Wallpapers")
        .to_string_lossy()
        .to_string()
}

/// Filters applied to searches started from the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    /// general / anime / people bitmask
    pub categories: String,
    /// sfw / sketchy / nsfw bitmask
    pub purity: String,
    /// Minimum resolution, e.g. "1920x1080"
    pub atleast: Option<String>,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            categories: "111".to_string(),
            purity: "100".to_string(),
            atleast: Some("1920x1080".to_string()),
        }
    }
}

impl SearchDefaults {
    /// Starts a query pre-filled with these filters.
    pub fn query(&self, text: &str) -> SearchQuery {
        SearchQuery {
            query: text.to_string(),
            categories: self.categories.clone(),
            purity: self.purity.clone(),
            atleast: self.atleast.clone(),
            ..Default::default()
        }
    }
}

/// User configuration for the application.
///
/// Persisted to `~/.config/cosmic-wallhaven-wallpaper/config.json` as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory where downloaded wallpapers are stored.
    pub wallpaper_dir: String,
    /// Root of the gallery API (no trailing slash).
    pub api_base_url: String,
    pub search_defaults: SearchDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wallpaper_dir: default_wallpaper_dir(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            search_defaults: SearchDefaults::default(),
        }
    }
}

impl Config {
    /// Returns the path to the configuration file.
    fn config_path() -> Option<PathBuf> {
        app_config_dir().map(|p| p.join("config.json"))
    }

    /// Loads the configuration from disk.
    ///
    /// On first run the defaults are written out so there is a file to edit.
    /// An unreadable or malformed file yields defaults and is left untouched.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                match config.write_to(path) {
                    Ok(()) => info!(path = %path.display(), "Wrote default config"),
                    Err(e) => warn!(path = %path.display(), error = %e, "Could not write default config"),
                }
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read config, using defaults");
                Self::default()
            }
        }
    }

    /// Writes the configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }

    /// Creates the wallpaper directory if it is missing and returns it.
    pub fn ensure_wallpaper_dir(&self) -> std::io::Result<PathBuf> {
        let dir = PathBuf::from(&self.wallpaper_dir);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
