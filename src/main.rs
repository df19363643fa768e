//! # Cosmic Wallhaven Wallpaper
//!
//! Command-line front end and daemon entry point.
//!
//! ## Modes
//! - `--daemon`: owns the settings, serves the D-Bus interface and switches
//!   the wallpaper whenever the COSMIC theme flips between light and dark
//! - any other command: a one-shot action. If the daemon is running the
//!   action is sent to it over D-Bus; otherwise it runs in-process.

use std::sync::Arc;

use cosmic_wallhaven_wallpaper::appearance::{
    run_appearance_loop, watch_theme_changes, AppearanceSource, CosmicAppearance,
};
use cosmic_wallhaven_wallpaper::config::Config;
use cosmic_wallhaven_wallpaper::dbus_client::{is_service_available, WallpaperClient};
use cosmic_wallhaven_wallpaper::models::{format_compact, format_file_size, Sorting};
use cosmic_wallhaven_wallpaper::service::{self, AppCoordinator};
use cosmic_wallhaven_wallpaper::setter::CosmicSetter;
use cosmic_wallhaven_wallpaper::settings::{JsonFileBackend, SettingsStore};
use cosmic_wallhaven_wallpaper::{
    logging, AppearanceMode, Settings, SearchPager, WallhavenClient, WallpaperCoordinator,
    WallpaperSummary,
};
use tracing::{info, warn};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("cosmic-wallhaven-wallpaper");

    let Some(command) = args.get(1) else {
        print_help(program);
        return;
    };

    match command.as_str() {
        "--help" | "-h" => print_help(program),
        "--version" | "-v" => {
            println!("cosmic-wallhaven-wallpaper {}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Failed to create tokio runtime: {e}");
                    std::process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(dispatch(command, &args[2..])) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Prints help message
fn print_help(program: &str) {
    println!("Wallhaven wallpapers with light/dark switching for COSMIC\n");
    println!("Usage: {} <COMMAND> [OPTIONS]\n", program);
    println!("Commands:");
    println!("  --daemon, -d                    Run the background service");
    println!("  search [TERMS] [--sort KEY] [--pages N]");
    println!("                                  Search the gallery");
    println!("  set <ID> --light|--dark         Download a wallpaper and use it for a mode");
    println!("  clear --light|--dark            Forget the wallpaper for a mode");
    println!("  favorite <ID>                   Add or remove a favorite");
    println!("  favorites                       List favorites");
    println!("  import <PATH>                   Import a local image");
    println!("  locals                          List imported images");
    println!("  set-local <LOCAL-ID> --light|--dark");
    println!("                                  Use an imported image for a mode");
    println!("  auto-switch on|off              Follow system appearance changes");
    println!("  api-key [KEY]                   Store (or clear) the API key");
    println!("  apply                           Apply the wallpaper for the current appearance");
    println!("  status                          Show current selections");
    println!("  --version, -v                   Show version information");
    println!("  --help, -h                      Show this help message");
    println!();
    println!("Set RUST_LOG=debug for verbose logging.");
}

/// Where a one-shot command is carried out.
enum Target {
    /// The running daemon, over D-Bus
    Daemon(WallpaperClient),
    /// An in-process coordinator (no daemon running)
    Local(AppCoordinator),
}

fn build_coordinator(config: &Config) -> Result<AppCoordinator, String> {
    let wallpaper_dir = config
        .ensure_wallpaper_dir()
        .map_err(|e| format!("Failed to create wallpaper directory: {e}"))?;
    let backend = JsonFileBackend::in_config_dir()
        .ok_or("Could not determine config directory")?;
    let gallery = WallhavenClient::with_base_url(&config.api_base_url)
        .map_err(|e| e.to_string())?;
    let appearance = CosmicAppearance::new().current();

    Ok(WallpaperCoordinator::new(
        SettingsStore::open(backend),
        gallery,
        CosmicSetter,
        wallpaper_dir,
        appearance,
    ))
}

async fn target(config: &Config) -> Result<Target, String> {
    if is_service_available().await {
        match WallpaperClient::connect().await {
            Ok(client) => return Ok(Target::Daemon(client)),
            Err(e) => warn!(error = %e, "Daemon found but not reachable, running locally"),
        }
    }
    build_coordinator(config).map(Target::Local)
}

/// Reads `--light` / `--dark` from the arguments.
fn mode_flag(args: &[String]) -> Result<AppearanceMode, String> {
    let light = args.iter().any(|a| a == "--light");
    let dark = args.iter().any(|a| a == "--dark");
    match (light, dark) {
        (true, false) => Ok(AppearanceMode::Light),
        (false, true) => Ok(AppearanceMode::Dark),
        _ => Err("Specify exactly one of --light or --dark".to_string()),
    }
}

fn option_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn positional(args: &[String]) -> Result<&str, String> {
    args.iter()
        .find(|a| !a.starts_with("--"))
        .map(String::as_str)
        .ok_or_else(|| "Missing argument".to_string())
}

fn print_wallpaper(w: &WallpaperSummary) {
    println!(
        "{}  {:>9}  {:>6} views  {:>6} favs  {:>9}  {}",
        w.id,
        w.resolution,
        format_compact(w.views),
        format_compact(w.favorites),
        format_file_size(w.file_size),
        w.url
    );
}

fn print_status(settings: &Settings, appearance: AppearanceMode) {
    println!("Appearance:   {appearance}");
    println!("Auto-switch:  {}", if settings.auto_switch_enabled { "on" } else { "off" });
    println!("API key:      {}", if settings.api_key.is_some() { "set" } else { "not set" });
    for mode in [AppearanceMode::Light, AppearanceMode::Dark] {
        match (settings.wallpaper_id(mode), settings.wallpaper_path(mode)) {
            (Some(id), Some(path)) => println!("{mode:<6}        {id} ({path})"),
            _ => println!("{mode:<6}        none"),
        }
    }
    println!("Favorites:    {}", settings.favorites.len());
    println!("Local images: {}", settings.local_favorites.len());
}

async fn dispatch(command: &str, args: &[String]) -> Result<(), String> {
    let config = Config::load();

    match command {
        "--daemon" | "-d" => run_daemon(&config).await,
        "search" => run_search(&config, args).await,
        "set" => {
            let id = positional(args)?;
            let mode = mode_flag(args)?;
            let path = match target(&config).await? {
                Target::Daemon(client) => client
                    .set_wallpaper(id, mode)
                    .await
                    .map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator
                    .set_remote_wallpaper(id, mode)
                    .await
                    .map_err(|e| e.to_string())?
                    .to_string_lossy()
                    .to_string(),
            };
            println!("{mode} wallpaper: {path}");
            Ok(())
        }
        "clear" => {
            let mode = mode_flag(args)?;
            match target(&config).await? {
                Target::Daemon(client) => client.clear_wallpaper(mode).await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator.clear_wallpaper(mode),
            }
            println!("Cleared {mode} wallpaper");
            Ok(())
        }
        "favorite" => {
            let id = positional(args)?;
            let now_favorite = match target(&config).await? {
                Target::Daemon(client) => client.toggle_favorite(id).await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator.toggle_favorite(id),
            };
            println!("{id} {}", if now_favorite { "added to favorites" } else { "removed from favorites" });
            Ok(())
        }
        "favorites" => {
            let favorites = match target(&config).await? {
                Target::Daemon(client) => client.load_favorites().await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator.load_favorites().await,
            };
            if favorites.is_empty() {
                println!("No favorites");
            }
            favorites.iter().for_each(print_wallpaper);
            Ok(())
        }
        "import" => {
            let path = positional(args)?;
            let path = std::fs::canonicalize(path)
                .map_err(|e| format!("Cannot read {path}: {e}"))?
                .to_string_lossy()
                .to_string();
            let local = match target(&config).await? {
                Target::Daemon(client) => client.add_local_favorite(&path).await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator
                    .add_local_favorite(&path)
                    .ok_or_else(|| format!("Already imported: {path}"))?,
            };
            println!("{}  {}  {}", local.id, local.resolution(), local.name);
            Ok(())
        }
        "locals" => {
            let settings = match target(&config).await? {
                Target::Daemon(client) => client.get_settings().await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator.settings(),
            };
            for local in &settings.local_favorites {
                println!(
                    "{}  {:>9}  {:>9}  {}",
                    local.id,
                    local.resolution(),
                    format_file_size(local.file_size),
                    local.path
                );
            }
            Ok(())
        }
        "set-local" => {
            let local_id = positional(args)?;
            let mode = mode_flag(args)?;
            match target(&config).await? {
                Target::Daemon(client) => client
                    .set_local_wallpaper(local_id, mode)
                    .await
                    .map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator
                    .set_local_wallpaper_by_id(local_id, mode)
                    .map_err(|e| e.to_string())?,
            }
            println!("{mode} wallpaper set to local image {local_id}");
            Ok(())
        }
        "auto-switch" => {
            let enabled = match positional(args)? {
                "on" => true,
                "off" => false,
                other => return Err(format!("Expected on or off, got {other}")),
            };
            match target(&config).await? {
                Target::Daemon(client) => client.set_auto_switch(enabled).await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator.set_auto_switch(enabled),
            }
            println!("Auto-switch {}", if enabled { "on" } else { "off" });
            Ok(())
        }
        "api-key" => {
            let key = args.first().map(String::as_str);
            match target(&config).await? {
                Target::Daemon(client) => client.set_api_key(key).await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator.set_api_key(key.map(str::to_string)),
            }
            println!("API key {}", if key.is_some() { "stored" } else { "cleared" });
            Ok(())
        }
        "apply" => {
            let applied = match target(&config).await? {
                Target::Daemon(client) => client.apply_current().await.map_err(|e| e.to_string())?,
                Target::Local(coordinator) => coordinator
                    .apply_for_current_appearance()
                    .map_err(|e| e.to_string())?,
            };
            if !applied {
                println!("No wallpaper stored for the current appearance");
            }
            Ok(())
        }
        "status" => {
            let (settings, appearance) = match target(&config).await? {
                Target::Daemon(client) => (
                    client.get_settings().await.map_err(|e| e.to_string())?,
                    client.get_appearance().await.map_err(|e| e.to_string())?,
                ),
                Target::Local(coordinator) => (coordinator.settings(), coordinator.current_appearance()),
            };
            print_status(&settings, appearance);
            Ok(())
        }
        other => Err(format!("Unknown command: {other}\nUse --help for usage information")),
    }
}

/// Searches directly against the API; no settings are changed.
async fn run_search(config: &Config, args: &[String]) -> Result<(), String> {
    let terms: Vec<&str> = args
        .iter()
        .enumerate()
        .filter(|(i, a)| {
            !a.starts_with("--") && (*i == 0 || !args[i - 1].starts_with("--"))
        })
        .map(|(_, a)| a.as_str())
        .collect();

    let mut query = config.search_defaults.query(&terms.join(" "));
    if let Some(sort) = option_value(args, "--sort") {
        query.sorting = sort.parse::<Sorting>().map_err(|e| e.to_string())?;
    }
    let pages: u32 = option_value(args, "--pages")
        .map(|p| p.parse::<u32>().map_err(|_| format!("Invalid page count: {p}")))
        .transpose()?
        .unwrap_or(1)
        .max(1);

    // Read-only use of the stored key; the daemon (if any) stays the only writer
    let backend = JsonFileBackend::in_config_dir().ok_or("Could not determine config directory")?;
    query.api_key = SettingsStore::load(&backend).api_key;

    let client = WallhavenClient::with_base_url(&config.api_base_url).map_err(|e| e.to_string())?;
    let mut pager = SearchPager::new(query);
    pager.load_first(&client).await.map_err(|e| e.to_string())?;
    while pager.current_page() < pages && pager.has_more() {
        pager.load_next(&client).await.map_err(|e| e.to_string())?;
    }

    for wallpaper in pager.results() {
        print_wallpaper(wallpaper);
    }
    println!(
        "{} results, {} page(s) loaded{}",
        pager.results().len(),
        pager.current_page(),
        if pager.has_more() { ", more available" } else { "" }
    );
    Ok(())
}

/// Runs the background service until interrupted.
///
/// Applies the wallpaper for the current appearance once at start, serves
/// the D-Bus interface and reacts to theme changes.
async fn run_daemon(config: &Config) -> Result<(), String> {
    let coordinator = Arc::new(build_coordinator(config)?);
    info!(appearance = %coordinator.current_appearance(), "Daemon starting");

    if let Err(e) = coordinator.apply_for_current_appearance() {
        warn!(error = %e, "Initial apply failed");
    }

    // Without D-Bus the daemon still switches wallpapers, CLI commands just run locally
    let _connection = match service::serve(coordinator.clone()).await {
        Ok(conn) => Some(conn),
        Err(e) => {
            warn!(error = %e, "Failed to start D-Bus service");
            None
        }
    };

    let source = CosmicAppearance::new();
    let signals = match source.theme_path().map(watch_theme_changes) {
        Some(Ok(signals)) => Some(signals),
        Some(Err(e)) => {
            warn!(error = %e, "Cannot watch theme changes, auto-switch disabled for this run");
            None
        }
        None => {
            warn!("Could not determine theme config path, auto-switch disabled for this run");
            None
        }
    };

    match signals {
        Some(signals) => {
            tokio::select! {
                _ = run_appearance_loop(coordinator, source, signals) => {}
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        }
    }
    Ok(())
}
