//! # Cosmic Wallhaven Wallpaper
//!
//! Browse the Wallhaven gallery, keep one wallpaper per appearance mode and
//! switch the COSMIC desktop background automatically when the system moves
//! between light and dark.
//!
//! ## Architecture
//! - `models.rs` - Search parameters, API records, local imports, appearance mode
//! - `wallhaven.rs` - Gallery API client (search, detail, download) and result paging
//! - `settings.rs` - Persisted user settings and their single owner
//! - `coordinator.rs` - Download, record and apply sequencing; favorites
//! - `appearance.rs` - Light/dark detection and theme-change signals
//! - `setter.rs` - Applies an image as the desktop background
//! - `service.rs` / `dbus_client.rs` - D-Bus surface of the daemon and its client
//! - `config.rs` - Application configuration and directories
//! - `error.rs` - Error types
//! - `logging.rs` - tracing set-up

pub mod appearance;
pub mod config;
pub mod coordinator;
pub mod dbus_client;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;
pub mod setter;
pub mod settings;
pub mod wallhaven;

pub use coordinator::WallpaperCoordinator;
pub use error::{GalleryError, SetterError, WallpaperError};
pub use models::{AppearanceMode, LocalWallpaper, SearchQuery, WallpaperDetail, WallpaperSummary};
pub use settings::{Settings, SettingsStore};
pub use wallhaven::{Gallery, SearchPager, WallhavenClient};
