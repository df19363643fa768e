//! # Settings Store
//!
//! Owns the user's wallpaper choices and persists them as a single JSON blob
//! under the key [`SETTINGS_KEY`].
//!
//! All mutations go through [`SettingsStore::update`], which saves the new
//! value before returning and then notifies subscribers through a
//! `tokio::sync::watch` channel. Loading never fails: a missing or broken
//! blob yields default settings (the broken case is logged).

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::{AppearanceMode, LocalWallpaper};

/// Key the settings blob is stored under.
pub const SETTINGS_KEY: &str = "WallpaperSettings";

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub light_wallpaper_path: Option<String>,
    pub dark_wallpaper_path: Option<String>,
    /// Remote id, or `local:{uuid}` for an imported file
    pub light_wallpaper_id: Option<String>,
    pub dark_wallpaper_id: Option<String>,
    /// Re-apply the matching wallpaper when the system theme changes
    pub auto_switch_enabled: bool,
    pub api_key: Option<String>,
    /// Favorited remote ids, in the order they were added
    pub favorites: Vec<String>,
    pub local_favorites: Vec<LocalWallpaper>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            light_wallpaper_path: None,
            dark_wallpaper_path: None,
            light_wallpaper_id: None,
            dark_wallpaper_id: None,
            auto_switch_enabled: true,
            api_key: None,
            favorites: Vec::new(),
            local_favorites: Vec::new(),
        }
    }
}

impl Settings {
    pub fn wallpaper_path(&self, mode: AppearanceMode) -> Option<&str> {
        match mode {
            AppearanceMode::Light => self.light_wallpaper_path.as_deref(),
            AppearanceMode::Dark => self.dark_wallpaper_path.as_deref(),
        }
    }

    pub fn wallpaper_id(&self, mode: AppearanceMode) -> Option<&str> {
        match mode {
            AppearanceMode::Light => self.light_wallpaper_id.as_deref(),
            AppearanceMode::Dark => self.dark_wallpaper_id.as_deref(),
        }
    }

    pub fn set_wallpaper(&mut self, mode: AppearanceMode, path: String, id: String) {
        let (slot_path, slot_id) = self.slots_mut(mode);
        *slot_path = Some(path);
        *slot_id = Some(id);
    }

    pub fn clear_wallpaper(&mut self, mode: AppearanceMode) {
        let (slot_path, slot_id) = self.slots_mut(mode);
        *slot_path = None;
        *slot_id = None;
    }

    fn slots_mut(&mut self, mode: AppearanceMode) -> (&mut Option<String>, &mut Option<String>) {
        match mode {
            AppearanceMode::Light => (&mut self.light_wallpaper_path, &mut self.light_wallpaper_id),
            AppearanceMode::Dark => (&mut self.dark_wallpaper_path, &mut self.dark_wallpaper_id),
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.iter().any(|f| f == id)
    }

    /// Adds or removes `id`; returns whether it is a favorite afterwards.
    pub fn toggle_favorite(&mut self, id: &str) -> bool {
        if let Some(index) = self.favorites.iter().position(|f| f == id) {
            self.favorites.remove(index);
            false
        } else {
            self.favorites.push(id.to_string());
            true
        }
    }

    /// Appends `local` unless an entry with the same path exists.
    pub fn add_local(&mut self, local: LocalWallpaper) -> bool {
        if self.local_favorites.iter().any(|l| l.path == local.path) {
            return false;
        }
        self.local_favorites.push(local);
        true
    }

    pub fn remove_local(&mut self, id: &str) -> bool {
        let before = self.local_favorites.len();
        self.local_favorites.retain(|l| l.id != id);
        self.local_favorites.len() != before
    }

    pub fn local(&self, id: &str) -> Option<&LocalWallpaper> {
        self.local_favorites.iter().find(|l| l.id == id)
    }

    /// Drops duplicate favorites and duplicate local paths left by hand edits.
    fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.favorites.retain(|id| seen.insert(id.clone()));
        let mut seen_paths = std::collections::HashSet::new();
        self.local_favorites.retain(|l| seen_paths.insert(l.path.clone()));
    }
}

// === Persistence backends ===

/// Key-value storage the settings blob is written to.
pub trait PreferenceBackend: Send + Sync {
    fn read(&self, key: &str) -> Option<Vec<u8>>;
    fn write(&self, key: &str, value: &[u8]) -> std::io::Result<()>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backend rooted at `~/.config/cosmic-wallhaven-wallpaper`.
    pub fn in_config_dir() -> Option<Self> {
        crate::config::app_config_dir().map(Self::new)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl PreferenceBackend for JsonFileBackend {
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path_for(key)).ok()
    }

    fn write(&self, key: &str, value: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        // Write beside the target and rename so readers never see half a file
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value)?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }
}

/// In-process backend for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn with_entry(key: &str, value: impl Into<Vec<u8>>) -> Self {
        let backend = Self::default();
        backend
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
        backend
    }
}

impl PreferenceBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: &[u8]) -> std::io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

impl<T: PreferenceBackend + ?Sized> PreferenceBackend for std::sync::Arc<T> {
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &[u8]) -> std::io::Result<()> {
        (**self).write(key, value)
    }
}

// === Store ===

/// Single in-memory owner of [`Settings`].
pub struct SettingsStore {
    backend: Box<dyn PreferenceBackend>,
    current: Mutex<Settings>,
    changes: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Loads settings from `backend` and takes ownership of it.
    pub fn open(backend: impl PreferenceBackend + 'static) -> Self {
        let settings = Self::load(&backend);
        let (changes, _) = watch::channel(settings.clone());
        Self {
            backend: Box::new(backend),
            current: Mutex::new(settings),
            changes,
        }
    }

    /// Reads the persisted blob; defaults if absent or undecodable.
    pub fn load(backend: &dyn PreferenceBackend) -> Settings {
        let Some(bytes) = backend.read(SETTINGS_KEY) else {
            debug!("No stored settings, starting with defaults");
            return Settings::default();
        };

        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(mut settings) => {
                settings.normalize();
                settings
            }
            Err(e) => {
                warn!(error = %e, "Stored settings could not be decoded, starting with defaults");
                Settings::default()
            }
        }
    }

    /// Writes `settings` to the backend. Failures are logged, never returned.
    pub fn save(&self, settings: &Settings) {
        let bytes = match serde_json::to_vec_pretty(settings) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode settings, changes not persisted");
                return;
            }
        };
        if let Err(e) = self.backend.write(SETTINGS_KEY, &bytes) {
            warn!(error = %e, "Failed to write settings, changes not persisted");
        }
    }

    /// Applies `f` to the settings. If anything changed, the new value is
    /// persisted and broadcast before this returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        let mut settings = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let before = settings.clone();
        let result = f(&mut settings);

        if *settings != before {
            self.save(&settings);
            self.changes.send_replace(settings.clone());
            info!("Settings updated");
        }
        result
    }

    pub fn snapshot(&self) -> Settings {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver that observes every persisted change.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.changes.subscribe()
    }
}
