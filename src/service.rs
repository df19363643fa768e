//! # Wallpaper Service Module
//!
//! Exposes the coordinator's actions as a D-Bus service so one long-running
//! daemon owns the settings while CLI invocations act through it.
//!
//! ## D-Bus Interface
//!
//! Service name: `io.github.cosmic_wallhaven_wallpaper.Wallpaper1`
//! Object path: `/io/github/cosmic_wallhaven_wallpaper/Wallpaper1`
//!
//! ### Methods
//! - `SetWallpaper(id, mode) -> path` - Download a remote wallpaper and use it for a mode
//! - `SetLocalWallpaper(local_id, mode)` - Use an imported file for a mode
//! - `ClearWallpaper(mode)` - Forget the wallpaper for a mode
//! - `ToggleFavorite(id) -> bool` - Add/remove a favorite, returns the new state
//! - `LoadFavorites() -> json` - Details of all favorites that could be fetched
//! - `AddLocalFavorite(path) -> json` - Import a local file
//! - `RemoveLocalFavorite(local_id) -> bool`
//! - `SetAutoSwitch(enabled)` / `SetApiKey(key)` - Preferences (empty key clears)
//! - `ApplyCurrent() -> bool` - Apply the wallpaper for the current appearance
//! - `GetSettings() -> json` / `GetAppearance() -> string`
//!
//! ### Signals
//! - `WallpaperChanged(mode, path)` - A mode got a new wallpaper
//! - `SettingsChanged()` - Settings were persisted

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use zbus::{interface, Connection, SignalContext};

use crate::coordinator::WallpaperCoordinator;
use crate::models::AppearanceMode;
use crate::setter::CosmicSetter;
use crate::settings::Settings;
use crate::wallhaven::WallhavenClient;

/// D-Bus service name, unique on the session bus.
pub const SERVICE_NAME: &str = "io.github.cosmic_wallhaven_wallpaper.Wallpaper1";

/// D-Bus object path of the interface.
pub const OBJECT_PATH: &str = "/io/github/cosmic_wallhaven_wallpaper/Wallpaper1";

/// The coordinator as wired up in the daemon.
pub type AppCoordinator = WallpaperCoordinator<WallhavenClient, CosmicSetter>;

fn failed(err: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

fn parse_mode(mode: &str) -> zbus::fdo::Result<AppearanceMode> {
    mode.parse().map_err(|e| zbus::fdo::Error::InvalidArgs(format!("{e}")))
}

/// D-Bus front end for the coordinator.
pub struct WallpaperService {
    coordinator: Arc<AppCoordinator>,
}

impl WallpaperService {
    pub fn new(coordinator: Arc<AppCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Runs a coordinator action that may apply a wallpaper on the blocking
    /// pool, so the bus keeps serving other calls meanwhile.
    async fn blocking<T, F>(&self, f: F) -> zbus::fdo::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&AppCoordinator) -> T + Send + 'static,
    {
        let coordinator = Arc::clone(&self.coordinator);
        tokio::task::spawn_blocking(move || f(&coordinator))
            .await
            .map_err(failed)
    }
}

#[interface(name = "io.github.cosmic_wallhaven_wallpaper.Wallpaper1")]
impl WallpaperService {
    /// Download a remote wallpaper and use it for `mode`
    async fn set_wallpaper(
        &self,
        id: String,
        mode: String,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> zbus::fdo::Result<String> {
        let mode = parse_mode(&mode)?;
        let path = self
            .coordinator
            .set_remote_wallpaper(&id, mode)
            .await
            .map_err(failed)?;

        let path = path.to_string_lossy().to_string();
        Self::wallpaper_changed(&ctx, mode.as_str(), &path).await?;
        Ok(path)
    }

    /// Use an imported local file for `mode`
    async fn set_local_wallpaper(
        &self,
        local_id: String,
        mode: String,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> zbus::fdo::Result<()> {
        let mode = parse_mode(&mode)?;
        self.blocking(move |c| c.set_local_wallpaper_by_id(&local_id, mode))
            .await?
            .map_err(failed)?;

        let settings = self.coordinator.settings();
        let path = settings.wallpaper_path(mode).unwrap_or_default();
        Self::wallpaper_changed(&ctx, mode.as_str(), path).await?;
        Ok(())
    }

    /// Forget the wallpaper for `mode` (the file stays on disk)
    async fn clear_wallpaper(&self, mode: String) -> zbus::fdo::Result<()> {
        let mode = parse_mode(&mode)?;
        self.coordinator.clear_wallpaper(mode);
        Ok(())
    }

    /// Returns whether `id` is a favorite after the toggle
    async fn toggle_favorite(&self, id: String) -> bool {
        self.coordinator.toggle_favorite(&id)
    }

    /// Details of every favorite that could be fetched, as a JSON array
    async fn load_favorites(&self) -> zbus::fdo::Result<String> {
        let favorites = self.coordinator.load_favorites().await;
        serde_json::to_string(&favorites).map_err(failed)
    }

    /// Import a local file; returns the new entry as JSON
    async fn add_local_favorite(&self, path: String) -> zbus::fdo::Result<String> {
        let local = self
            .coordinator
            .add_local_favorite(&path)
            .ok_or_else(|| failed(format!("Already imported: {path}")))?;
        serde_json::to_string(&local).map_err(failed)
    }

    async fn remove_local_favorite(&self, local_id: String) -> bool {
        self.coordinator.remove_local_favorite(&local_id)
    }

    async fn set_auto_switch(&self, enabled: bool) {
        self.coordinator.set_auto_switch(enabled);
    }

    /// Store the API key; an empty string clears it
    async fn set_api_key(&self, key: String) {
        self.coordinator.set_api_key(Some(key));
    }

    /// Apply the wallpaper for the current appearance; false if none is set
    async fn apply_current(&self) -> zbus::fdo::Result<bool> {
        self.blocking(|c| c.apply_for_current_appearance())
            .await?
            .map_err(failed)
    }

    /// Current settings as JSON
    async fn get_settings(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(&self.coordinator.settings()).map_err(failed)
    }

    /// "light" or "dark"
    async fn get_appearance(&self) -> String {
        self.coordinator.current_appearance().to_string()
    }

    // === Signals ===

    /// Signal emitted when a mode gets a new wallpaper
    #[zbus(signal)]
    async fn wallpaper_changed(ctx: &SignalContext<'_>, mode: &str, path: &str) -> zbus::Result<()>;

    /// Signal emitted after settings have been persisted
    #[zbus(signal)]
    async fn settings_changed(ctx: &SignalContext<'_>) -> zbus::Result<()>;
}

/// Claims the service name on the session bus and serves the interface.
///
/// The returned connection must be kept alive; dropping it stops the service.
pub async fn serve(coordinator: Arc<AppCoordinator>) -> zbus::Result<Connection> {
    let settings_rx = coordinator.settings_store().subscribe();
    let service = WallpaperService::new(coordinator);

    let connection = zbus::connection::Builder::session()?
        .name(SERVICE_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await?;
    info!("D-Bus service running at {OBJECT_PATH} on {SERVICE_NAME}");

    tokio::spawn(forward_settings_changes(connection.clone(), settings_rx));
    Ok(connection)
}

/// Emits `SettingsChanged` for every persisted change until the store goes away.
async fn forward_settings_changes(connection: Connection, mut rx: watch::Receiver<Settings>) {
    let ctx = match SignalContext::new(&connection, OBJECT_PATH) {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(error = %e, "Cannot emit settings signals");
            return;
        }
    };

    while rx.changed().await.is_ok() {
        debug!("Emitting SettingsChanged");
        if let Err(e) = WallpaperService::settings_changed(&ctx).await {
            warn!(error = %e, "Failed to emit SettingsChanged");
        }
    }
}
