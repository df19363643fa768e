//! # Error Types
//!
//! One enum per concern. The `Display` strings double as the human-readable
//! messages shown to the user (CLI output, D-Bus error replies), so they are
//! written as sentences rather than debug dumps.

use thiserror::Error;

/// Failures talking to the gallery API or writing a downloaded file.
#[derive(Debug, Error)]
pub enum GalleryError {
    /// URL could not be built or parsed.
    #[error("Invalid URL: {0}")]
    InvalidRequest(String),
    /// Connection, TLS or timeout failure.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    /// Response body did not match the expected schema.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Unauthorized - check your API key")]
    Unauthorized,
    #[error("Rate limited - too many requests")]
    RateLimited,
    #[error("HTTP error: {0}")]
    Http(u16),
    /// Temporary file creation, write or final replace failed.
    #[error("Failed to save download: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl GalleryError {
    /// Maps a non-success HTTP status onto the error taxonomy.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized,
            429 => Self::RateLimited,
            code => Self::Http(code),
        }
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

/// Failures applying an image as the desktop background.
#[derive(Debug, Error)]
pub enum SetterError {
    #[error("Could not find home directory")]
    NoHomeDir,
    #[error("Failed to write background config: {0}")]
    Config(#[source] std::io::Error),
    #[error("Failed to restart background service: {0}")]
    Restart(#[source] std::io::Error),
    #[error("Background apply task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failures of a coordinator action.
#[derive(Debug, Error)]
pub enum WallpaperError {
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error("Failed to apply wallpaper: {0}")]
    Apply(#[from] SetterError),
    #[error("No local wallpaper with id {0}")]
    UnknownLocal(String),
    #[error("Refusing to store wallpaper under unsafe file name: {0}")]
    UnsafeFileName(String),
}

/// Failures parsing user-supplied enum values (CLI flags, D-Bus arguments).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown appearance mode: {0} (expected light or dark)")]
    Mode(String),
    #[error("Unknown sorting: {0}")]
    Sorting(String),
}
