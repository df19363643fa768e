//! # Wallpaper Coordinator
//!
//! Sequences the user-facing actions: download a remote wallpaper, record it
//! for an appearance mode, and apply it when that mode is the one currently
//! shown. Also owns favorites and imported local files.
//!
//! The coordinator is the only writer of [`Settings`]; it is created once at
//! start-up and shared by reference (`Arc`) with the D-Bus service and the
//! appearance loop. Concurrent actions are allowed and the last write to a
//! settings field wins.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{GalleryError, SetterError, WallpaperError};
use crate::models::{AppearanceMode, LocalWallpaper, SearchPage, SearchQuery, WallpaperSummary};
use crate::setter::WallpaperSetter;
use crate::settings::{Settings, SettingsStore};
use crate::wallhaven::Gallery;

pub struct WallpaperCoordinator<G, W> {
    settings: SettingsStore,
    gallery: G,
    setter: Arc<W>,
    wallpaper_dir: PathBuf,
    /// Last appearance reported by the system
    appearance: Mutex<AppearanceMode>,
}

impl<G: Gallery, W: WallpaperSetter + 'static> WallpaperCoordinator<G, W> {
    pub fn new(
        settings: SettingsStore,
        gallery: G,
        setter: W,
        wallpaper_dir: impl Into<PathBuf>,
        appearance: AppearanceMode,
    ) -> Self {
        Self {
            settings,
            gallery,
            setter: Arc::new(setter),
            wallpaper_dir: wallpaper_dir.into(),
            appearance: Mutex::new(appearance),
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings.snapshot()
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn gallery(&self) -> &G {
        &self.gallery
    }

    pub fn current_appearance(&self) -> AppearanceMode {
        *self.appearance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Where a remote wallpaper lives on disk: `{dir}/{id}.{ext}`.
    ///
    /// The file name must be a single plain path component, so a record can
    /// never place a file outside the wallpaper directory.
    pub fn destination_for(&self, wallpaper: &WallpaperSummary) -> Result<PathBuf, WallpaperError> {
        let name = wallpaper.file_name();
        let mut components = Path::new(&name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.wallpaper_dir.join(&name)),
            _ => Err(WallpaperError::UnsafeFileName(name)),
        }
    }

    // === Remote wallpapers ===

    /// Runs a search, filling in the stored API key when the query has none.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage, GalleryError> {
        let mut query = query.clone();
        if query.api_key.is_none() {
            query.api_key = self.settings.snapshot().api_key;
        }
        self.gallery.search(&query).await
    }

    /// Downloads `wallpaper` (unless already on disk), records it for `mode`
    /// and applies it if `mode` is the current appearance.
    ///
    /// A failed download leaves the settings untouched. An apply failure is
    /// returned after the selection has been recorded.
    pub async fn download_and_set(
        &self,
        wallpaper: &WallpaperSummary,
        mode: AppearanceMode,
    ) -> Result<PathBuf, WallpaperError> {
        let destination = self.destination_for(wallpaper)?;

        if destination.exists() {
            debug!(id = %wallpaper.id, "Already downloaded, reusing file");
        } else {
            self.gallery.download(&wallpaper.path, &destination).await?;
        }

        let path = destination.to_string_lossy().to_string();
        let id = wallpaper.id.clone();
        self.settings.update(|s| s.set_wallpaper(mode, path, id));
        info!(id = %wallpaper.id, %mode, "Wallpaper selected");

        if mode == self.current_appearance() {
            // Setter blocks while cosmic-bg restarts; run it on the blocking pool
            let setter = Arc::clone(&self.setter);
            let path = destination.clone();
            let applied = tokio::task::spawn_blocking(move || setter.apply(&path))
                .await
                .map_err(SetterError::Task)?;
            applied?;
        } else {
            debug!(%mode, "Not the current appearance, deferring apply");
        }
        Ok(destination)
    }

    /// Looks up `id` and then behaves like [`Self::download_and_set`].
    pub async fn set_remote_wallpaper(
        &self,
        id: &str,
        mode: AppearanceMode,
    ) -> Result<PathBuf, WallpaperError> {
        let api_key = self.settings.snapshot().api_key;
        let detail = self.gallery.get_detail(id, api_key.as_deref()).await?;
        self.download_and_set(&detail.into(), mode).await
    }

    // === Local wallpapers ===

    /// Records an imported file for `mode`; no network involved.
    pub fn set_local_wallpaper(
        &self,
        local: &LocalWallpaper,
        mode: AppearanceMode,
    ) -> Result<(), WallpaperError> {
        let path = local.path.clone();
        let id = local.selection_id();
        self.settings.update(|s| s.set_wallpaper(mode, path, id));
        info!(id = %local.id, %mode, "Local wallpaper selected");

        self.apply_if_current(mode, Path::new(&local.path))?;
        Ok(())
    }

    pub fn set_local_wallpaper_by_id(
        &self,
        local_id: &str,
        mode: AppearanceMode,
    ) -> Result<(), WallpaperError> {
        let local = self
            .settings
            .snapshot()
            .local(local_id)
            .cloned()
            .ok_or_else(|| WallpaperError::UnknownLocal(local_id.to_string()))?;
        self.set_local_wallpaper(&local, mode)
    }

    /// Imports `path`; returns `None` if that path was already imported.
    pub fn add_local_favorite(&self, path: impl AsRef<Path>) -> Option<LocalWallpaper> {
        let local = LocalWallpaper::from_path(path);
        let added = self.settings.update(|s| s.add_local(local.clone()));
        added.then_some(local)
    }

    pub fn remove_local_favorite(&self, local_id: &str) -> bool {
        self.settings.update(|s| s.remove_local(local_id))
    }

    // === Selection and preferences ===

    /// Forgets the wallpaper for `mode`. The file stays on disk.
    pub fn clear_wallpaper(&self, mode: AppearanceMode) {
        self.settings.update(|s| s.clear_wallpaper(mode));
    }

    /// Adds or removes a favorite; returns the new state.
    pub fn toggle_favorite(&self, id: &str) -> bool {
        let now_favorite = self.settings.update(|s| s.toggle_favorite(id));
        debug!(id, now_favorite, "Favorite toggled");
        now_favorite
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.settings.snapshot().is_favorite(id)
    }

    pub fn set_auto_switch(&self, enabled: bool) {
        self.settings.update(|s| s.auto_switch_enabled = enabled);
    }

    /// Stores the API key; an empty or `None` key clears it.
    pub fn set_api_key(&self, key: Option<String>) {
        let key = key.filter(|k| !k.trim().is_empty());
        self.settings.update(|s| s.api_key = key);
    }

    /// Fetches details for every favorite, one request at a time.
    ///
    /// A failed lookup is logged and skipped; the remaining ids are still
    /// fetched. Results keep the favorites order.
    pub async fn load_favorites(&self) -> Vec<WallpaperSummary> {
        let settings = self.settings.snapshot();
        let mut loaded = Vec::with_capacity(settings.favorites.len());

        for id in &settings.favorites {
            match self.gallery.get_detail(id, settings.api_key.as_deref()).await {
                Ok(detail) => loaded.push(detail.into()),
                Err(e) => warn!(id = %id, error = %e, "Skipping favorite that failed to load"),
            }
        }

        if loaded.len() < settings.favorites.len() {
            warn!(
                loaded = loaded.len(),
                total = settings.favorites.len(),
                "Some favorites could not be loaded"
            );
        }
        loaded
    }

    // === Appearance ===

    /// Applies the wallpaper stored for the current appearance.
    ///
    /// Returns `Ok(false)` when nothing is stored for that mode or the file
    /// has since disappeared from disk.
    pub fn apply_for_current_appearance(&self) -> Result<bool, WallpaperError> {
        let mode = self.current_appearance();
        let Some(path) = self.settings.snapshot().wallpaper_path(mode).map(PathBuf::from) else {
            debug!(%mode, "No wallpaper stored for current appearance");
            return Ok(false);
        };

        if !path.exists() {
            warn!(%mode, path = %path.display(), "Stored wallpaper no longer exists");
            return Ok(false);
        }

        self.setter.apply(&path)?;
        Ok(true)
    }

    /// Records a new system appearance and, if auto-switch is on, applies
    /// the matching wallpaper. Every call applies again; there is no dedup.
    pub fn handle_appearance_change(&self, mode: AppearanceMode) -> Result<bool, WallpaperError> {
        *self.appearance.lock().unwrap_or_else(PoisonError::into_inner) = mode;
        info!(%mode, "Appearance changed");

        if !self.settings.snapshot().auto_switch_enabled {
            return Ok(false);
        }
        self.apply_for_current_appearance()
    }

    fn apply_if_current(&self, mode: AppearanceMode, path: &Path) -> Result<bool, WallpaperError> {
        if mode != self.current_appearance() {
            debug!(%mode, "Not the current appearance, deferring apply");
            return Ok(false);
        }
        self.setter.apply(path)?;
        Ok(true)
    }
}
