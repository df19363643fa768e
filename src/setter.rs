//! # Desktop Background Setter
//!
//! The coordinator only needs "make this file the background on every
//! output"; [`WallpaperSetter`] is that seam. [`CosmicSetter`] implements it
//! for the COSMIC desktop.

use std::path::Path;

use tracing::{debug, info};

use crate::error::SetterError;

/// Applies an image file as the desktop background on all displays.
pub trait WallpaperSetter: Send + Sync {
    fn apply(&self, image_path: &Path) -> Result<(), SetterError>;
}

/// Checks if the application is running inside a Flatpak sandbox.
///
/// Flatpak creates a `/.flatpak-info` file inside the sandbox; commands for
/// the host then have to go through `flatpak-spawn --host`.
pub fn is_flatpak() -> bool {
    Path::new("/.flatpak-info").exists()
}

/// Runs a command on the host system, automatically handling Flatpak sandboxing.
fn run_host_command(cmd: &str, args: &[&str]) -> std::io::Result<std::process::Output> {
    if is_flatpak() {
        let mut spawn_args = vec!["--host", cmd];
        spawn_args.extend(args);
        std::process::Command::new("flatpak-spawn")
            .args(&spawn_args)
            .output()
    } else {
        std::process::Command::new(cmd)
            .args(args)
            .output()
    }
}

/// Spawns a command in the background on the host system (non-blocking).
fn spawn_host_command(cmd: &str) -> std::io::Result<std::process::Child> {
    if is_flatpak() {
        std::process::Command::new("flatpak-spawn")
            .args(["--host", cmd])
            .spawn()
    } else {
        std::process::Command::new(cmd)
            .spawn()
    }
}

/// Builds the RON config COSMIC's background service reads.
fn cosmic_background_config(image_path: &Path) -> String {
    format!(
        r#"(
    output: "all",
    source: Path("{}"),
    filter_by_theme: false,
    rotation_frequency: 300,
    filter_method: Lanczos,
    scaling_mode: Zoom,
    sampling_method: Alphanumeric,
)"#,
        image_path.display()
    )
}

/// Sets the background by rewriting COSMIC's config and restarting `cosmic-bg`.
///
/// COSMIC has no "reload config" call; the only way to pick up a new image
/// is to restart the background process, which the session normally does by
/// itself after a SIGTERM.
#[derive(Debug, Clone, Default)]
pub struct CosmicSetter;

impl CosmicSetter {
    /// `~/.config/cosmic/com.system76.CosmicBackground/v1/all` on the host.
    ///
    /// Uses `home_dir()` rather than `config_dir()` because inside Flatpak the
    /// latter points at the sandboxed config, not the one COSMIC reads.
    fn config_path() -> Result<std::path::PathBuf, SetterError> {
        Ok(dirs::home_dir()
            .ok_or(SetterError::NoHomeDir)?
            .join(".config/cosmic/com.system76.CosmicBackground/v1/all"))
    }
}

impl WallpaperSetter for CosmicSetter {
    fn apply(&self, image_path: &Path) -> Result<(), SetterError> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(SetterError::Config)?;
        }
        std::fs::write(&config_path, cosmic_background_config(image_path))
            .map_err(SetterError::Config)?;

        let _ = run_host_command("pkill", &["-TERM", "-x", "cosmic-bg"]);

        // Give COSMIC a moment to auto-restart cosmic-bg
        std::thread::sleep(std::time::Duration::from_millis(1000));

        let check = run_host_command("pgrep", &["-x", "cosmic-bg"]);
        match check {
            Ok(output) if output.status.success() => {}
            _ => {
                debug!("cosmic-bg not restarted by the session, starting it");
                spawn_host_command("cosmic-bg").map_err(SetterError::Restart)?;
                std::thread::sleep(std::time::Duration::from_millis(500));
            }
        }

        info!(path = %image_path.display(), "Wallpaper applied");
        Ok(())
    }
}
