//! # Appearance Watcher
//!
//! Detects whether the desktop is in light or dark mode and turns theme
//! changes into a stream of signals the coordinator reacts to.
//!
//! COSMIC stores the current mode in a one-line file
//! (`~/.config/cosmic/com.system76.CosmicTheme.Mode/v1/is_dark`). We watch its
//! directory rather than the file itself because the file is replaced
//! atomically on every change.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::coordinator::WallpaperCoordinator;
use crate::models::AppearanceMode;
use crate::setter::WallpaperSetter;
use crate::wallhaven::Gallery;

/// Something that can report the current system appearance.
pub trait AppearanceSource: Send + Sync {
    fn current(&self) -> AppearanceMode;
}

/// Get the path to COSMIC's theme mode file
pub fn cosmic_theme_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cosmic/com.system76.CosmicTheme.Mode/v1/is_dark"))
}

/// Reads the appearance from COSMIC's theme file, falling back to the
/// freedesktop portal `color-scheme` setting.
#[derive(Debug, Clone)]
pub struct CosmicAppearance {
    theme_path: Option<PathBuf>,
}

impl CosmicAppearance {
    pub fn new() -> Self {
        Self { theme_path: cosmic_theme_path() }
    }

    /// Reads from a specific theme file instead of the user's.
    pub fn with_theme_path(path: impl Into<PathBuf>) -> Self {
        Self { theme_path: Some(path.into()) }
    }

    pub fn theme_path(&self) -> Option<&Path> {
        self.theme_path.as_deref()
    }

    fn read_theme_file(&self) -> Option<bool> {
        let content = std::fs::read_to_string(self.theme_path.as_ref()?).ok()?;
        Some(content.trim() == "true")
    }
}

impl Default for CosmicAppearance {
    fn default() -> Self {
        Self::new()
    }
}

impl AppearanceSource for CosmicAppearance {
    fn current(&self) -> AppearanceMode {
        if let Some(is_dark) = self.read_theme_file() {
            return AppearanceMode::from_is_dark(is_dark);
        }
        portal_color_scheme().unwrap_or_default()
    }
}

/// Asks the desktop portal via `gdbus`. Returns 1 for dark, 2 for light,
/// 0 for no preference (treated as unknown).
fn portal_color_scheme() -> Option<AppearanceMode> {
    let output = Command::new("gdbus")
        .args([
            "call", "--session",
            "--dest", "org.freedesktop.portal.Desktop",
            "--object-path", "/org/freedesktop/portal/desktop",
            "--method", "org.freedesktop.portal.Settings.Read",
            "org.freedesktop.appearance", "color-scheme",
        ])
        .output()
        .ok()?;

    parse_color_scheme(&String::from_utf8_lossy(&output.stdout))
}

fn parse_color_scheme(stdout: &str) -> Option<AppearanceMode> {
    if stdout.contains("uint32 1") {
        Some(AppearanceMode::Dark)
    } else if stdout.contains("uint32 2") {
        Some(AppearanceMode::Light)
    } else {
        None
    }
}

/// Theme-change signals. Holds the file watcher alive for as long as the
/// receiver is in use.
pub struct ThemeSignals {
    _watcher: Option<RecommendedWatcher>,
    rx: UnboundedReceiver<()>,
}

impl ThemeSignals {
    /// Wraps an existing receiver (tests, other event sources).
    pub fn from_receiver(rx: UnboundedReceiver<()>) -> Self {
        Self { _watcher: None, rx }
    }

    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Starts watching `theme_path` for changes.
///
/// Each modify/create event in its directory becomes one signal; nothing is
/// debounced.
pub fn watch_theme_changes(theme_path: &Path) -> notify::Result<ThemeSignals> {
    let watch_dir = theme_path
        .parent()
        .ok_or_else(|| notify::Error::path_not_found().add_path(theme_path.to_path_buf()))?;

    let (tx, rx) = unbounded_channel();
    let config = NotifyConfig::default().with_poll_interval(Duration::from_secs(1));
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!(error = %e, "Theme watcher error"),
        },
        config,
    )?;
    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    info!(dir = %watch_dir.display(), "Watching for theme changes");

    Ok(ThemeSignals { _watcher: Some(watcher), rx })
}

/// Re-derives the appearance on every signal and hands it to the
/// coordinator. Returns when the signal stream ends.
pub async fn run_appearance_loop<G, W, A>(
    coordinator: Arc<WallpaperCoordinator<G, W>>,
    source: A,
    mut signals: ThemeSignals,
) where
    G: Gallery + 'static,
    W: WallpaperSetter + 'static,
    A: AppearanceSource,
{
    while signals.recv().await.is_some() {
        let mode = source.current();
        debug!(%mode, "Theme change signal");

        let handle = Arc::clone(&coordinator);
        match tokio::task::spawn_blocking(move || handle.handle_appearance_change(mode)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to apply wallpaper after appearance change"),
            Err(e) => warn!(error = %e, "Appearance change task failed"),
        }
    }
    debug!("Theme signal stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_file_decides_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("is_dark");

        std::fs::write(&path, "true\n").unwrap();
        let source = CosmicAppearance::with_theme_path(&path);
        assert_eq!(source.read_theme_file(), Some(true));
        assert_eq!(source.current(), AppearanceMode::Dark);

        std::fs::write(&path, "false").unwrap();
        assert_eq!(source.current(), AppearanceMode::Light);
    }

    #[test]
    fn portal_output_parsing() {
        assert_eq!(parse_color_scheme("(<<uint32 1>>,)"), Some(AppearanceMode::Dark));
        assert_eq!(parse_color_scheme("(<<uint32 2>>,)"), Some(AppearanceMode::Light));
        assert_eq!(parse_color_scheme("(<<uint32 0>>,)"), None);
        assert_eq!(parse_color_scheme(""), None);
    }
}
