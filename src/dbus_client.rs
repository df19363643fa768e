//! # D-Bus Client Module
//!
//! High-level client for the wallpaper daemon. The CLI uses it so that one
//! process (the daemon) remains the only writer of the settings blob while it
//! is running.
//!
//! ## Usage
//!
//! ```ignore
//! let client = WallpaperClient::connect().await?;
//! let path = client.set_wallpaper("94x38z", AppearanceMode::Dark).await?;
//! println!("Dark wallpaper: {path}");
//! ```

use zbus::{proxy, Connection};

use crate::models::{AppearanceMode, LocalWallpaper, WallpaperSummary};
use crate::service::SERVICE_NAME;
use crate::settings::Settings;

/// D-Bus proxy for the wallpaper service
#[proxy(
    interface = "io.github.cosmic_wallhaven_wallpaper.Wallpaper1",
    default_service = "io.github.cosmic_wallhaven_wallpaper.Wallpaper1",
    default_path = "/io/github/cosmic_wallhaven_wallpaper/Wallpaper1"
)]
trait WallpaperService {
    async fn set_wallpaper(&self, id: &str, mode: &str) -> zbus::Result<String>;

    async fn set_local_wallpaper(&self, local_id: &str, mode: &str) -> zbus::Result<()>;

    async fn clear_wallpaper(&self, mode: &str) -> zbus::Result<()>;

    async fn toggle_favorite(&self, id: &str) -> zbus::Result<bool>;

    async fn load_favorites(&self) -> zbus::Result<String>;

    async fn add_local_favorite(&self, path: &str) -> zbus::Result<String>;

    async fn remove_local_favorite(&self, local_id: &str) -> zbus::Result<bool>;

    async fn set_auto_switch(&self, enabled: bool) -> zbus::Result<()>;

    async fn set_api_key(&self, key: &str) -> zbus::Result<()>;

    async fn apply_current(&self) -> zbus::Result<bool>;

    async fn get_settings(&self) -> zbus::Result<String>;

    async fn get_appearance(&self) -> zbus::Result<String>;

    // === Signals ===

    #[zbus(signal)]
    async fn wallpaper_changed(&self, mode: String, path: String) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn settings_changed(&self) -> zbus::Result<()>;
}

fn decode<T: serde::de::DeserializeOwned>(json: &str) -> zbus::Result<T> {
    serde_json::from_str(json).map_err(|e| zbus::Error::Failure(format!("Bad reply: {e}")))
}

/// High-level client for the wallpaper daemon
pub struct WallpaperClient {
    proxy: WallpaperServiceProxy<'static>,
}

impl WallpaperClient {
    /// Connect to the wallpaper service
    ///
    /// Returns an error if the daemon is not running
    pub async fn connect() -> zbus::Result<Self> {
        let connection = Connection::session().await?;
        let proxy = WallpaperServiceProxy::new(&connection).await?;
        Ok(Self { proxy })
    }

    /// Download `id` and use it for `mode`; returns the local path
    pub async fn set_wallpaper(&self, id: &str, mode: AppearanceMode) -> zbus::Result<String> {
        self.proxy.set_wallpaper(id, mode.as_str()).await
    }

    pub async fn set_local_wallpaper(&self, local_id: &str, mode: AppearanceMode) -> zbus::Result<()> {
        self.proxy.set_local_wallpaper(local_id, mode.as_str()).await
    }

    pub async fn clear_wallpaper(&self, mode: AppearanceMode) -> zbus::Result<()> {
        self.proxy.clear_wallpaper(mode.as_str()).await
    }

    pub async fn toggle_favorite(&self, id: &str) -> zbus::Result<bool> {
        self.proxy.toggle_favorite(id).await
    }

    pub async fn load_favorites(&self) -> zbus::Result<Vec<WallpaperSummary>> {
        decode(&self.proxy.load_favorites().await?)
    }

    pub async fn add_local_favorite(&self, path: &str) -> zbus::Result<LocalWallpaper> {
        decode(&self.proxy.add_local_favorite(path).await?)
    }

    pub async fn remove_local_favorite(&self, local_id: &str) -> zbus::Result<bool> {
        self.proxy.remove_local_favorite(local_id).await
    }

    pub async fn set_auto_switch(&self, enabled: bool) -> zbus::Result<()> {
        self.proxy.set_auto_switch(enabled).await
    }

    /// `None` clears the stored key
    pub async fn set_api_key(&self, key: Option<&str>) -> zbus::Result<()> {
        self.proxy.set_api_key(key.unwrap_or("")).await
    }

    pub async fn apply_current(&self) -> zbus::Result<bool> {
        self.proxy.apply_current().await
    }

    pub async fn get_settings(&self) -> zbus::Result<Settings> {
        decode(&self.proxy.get_settings().await?)
    }

    pub async fn get_appearance(&self) -> zbus::Result<AppearanceMode> {
        let mode = self.proxy.get_appearance().await?;
        mode.parse()
            .map_err(|e| zbus::Error::Failure(format!("Bad reply: {e}")))
    }
}

/// Check if the daemon is running and registered on D-Bus
pub async fn is_service_available() -> bool {
    if let Ok(connection) = Connection::session().await {
        connection
            .call_method(
                Some("org.freedesktop.DBus"),
                "/org/freedesktop/DBus",
                Some("org.freedesktop.DBus"),
                "NameHasOwner",
                &SERVICE_NAME,
            )
            .await
            .and_then(|reply| reply.body().deserialize::<bool>())
            .unwrap_or(false)
    } else {
        false
    }
}
