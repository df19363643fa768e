//! Tracing subscriber set-up.
//!
//! Log level comes from `RUST_LOG` when set (e.g. `RUST_LOG=cosmic_wallhaven_wallpaper=debug`),
//! otherwise `info`. Output goes to stderr so CLI results on stdout stay clean.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
