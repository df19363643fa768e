//! # Data Model
//!
//! Types shared by the gallery client, the settings store and the coordinator.
//!
//! The remote types ([`WallpaperSummary`], [`WallpaperDetail`], [`SearchMeta`])
//! map directly onto the Wallhaven JSON schema; field names stay snake_case
//! because that is what the API sends. [`LocalWallpaper`] is created when the
//! user imports a file from disk and is persisted inside the settings blob.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ParseError;

// === Search parameters ===

/// Result ordering key understood by the `/search` endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sorting {
    #[default]
    DateAdded,
    Relevance,
    Random,
    Views,
    Favorites,
    /// Ranking over a time window; requires [`TopRange`].
    Toplist,
    Hot,
}

impl Sorting {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DateAdded => "date_added",
            Self::Relevance => "relevance",
            Self::Random => "random",
            Self::Views => "views",
            Self::Favorites => "favorites",
            Self::Toplist => "toplist",
            Self::Hot => "hot",
        }
    }
}

impl FromStr for Sorting {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date_added" => Ok(Self::DateAdded),
            "relevance" => Ok(Self::Relevance),
            "random" => Ok(Self::Random),
            "views" => Ok(Self::Views),
            "favorites" => Ok(Self::Favorites),
            "toplist" => Ok(Self::Toplist),
            "hot" => Ok(Self::Hot),
            other => Err(ParseError::Sorting(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Desc,
    Asc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desc => "desc",
            Self::Asc => "asc",
        }
    }
}

/// Time window used by [`Sorting::Toplist`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TopRange {
    OneDay,
    ThreeDays,
    OneWeek,
    #[default]
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl TopRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1y",
        }
    }
}

/// Parameters for one `/search` request.
///
/// Bitmask fields are three-character strings of `0`/`1`:
/// - `categories`: general / anime / people
/// - `purity`: sfw / sketchy / nsfw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text query; omitted from the request when empty
    pub query: String,
    pub categories: String,
    pub purity: String,
    pub sorting: Sorting,
    pub order: Order,
    /// Only sent when `sorting` is [`Sorting::Toplist`]
    pub top_range: TopRange,
    /// Minimum resolution, e.g. `"1920x1080"`
    pub atleast: Option<String>,
    /// Exact resolutions
    pub resolutions: Option<Vec<String>>,
    /// Aspect ratios, e.g. `"16x9"`
    pub ratios: Option<Vec<String>>,
    /// Hex colour without the leading `#`
    pub colors: Option<String>,
    pub page: u32,
    /// Seed returned by a previous random search, keeps pages stable
    pub seed: Option<String>,
    pub api_key: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            categories: "111".to_string(),
            purity: "100".to_string(),
            sorting: Sorting::default(),
            order: Order::default(),
            top_range: TopRange::default(),
            atleast: None,
            resolutions: None,
            ratios: None,
            colors: None,
            page: 1,
            seed: None,
            api_key: None,
        }
    }
}

impl SearchQuery {
    /// Serializes the query into ordered URL parameters.
    ///
    /// Unset optional fields are left out entirely. `categories`, `purity`,
    /// `sorting`, `order` and `page` are always present.
    pub fn to_query_items(&self) -> Vec<(&'static str, String)> {
        let mut items = Vec::new();

        if !self.query.is_empty() {
            items.push(("q", self.query.clone()));
        }
        items.push(("categories", self.categories.clone()));
        items.push(("purity", self.purity.clone()));
        items.push(("sorting", self.sorting.as_str().to_string()));
        items.push(("order", self.order.as_str().to_string()));

        if self.sorting == Sorting::Toplist {
            items.push(("topRange", self.top_range.as_str().to_string()));
        }
        if let Some(atleast) = &self.atleast {
            items.push(("atleast", atleast.clone()));
        }
        if let Some(resolutions) = self.resolutions.as_ref().filter(|r| !r.is_empty()) {
            items.push(("resolutions", resolutions.join(",")));
        }
        if let Some(ratios) = self.ratios.as_ref().filter(|r| !r.is_empty()) {
            items.push(("ratios", ratios.join(",")));
        }
        if let Some(colors) = &self.colors {
            items.push(("colors", colors.clone()));
        }

        items.push(("page", self.page.to_string()));

        if let Some(seed) = &self.seed {
            items.push(("seed", seed.clone()));
        }
        if let Some(api_key) = &self.api_key {
            items.push(("apikey", api_key.clone()));
        }

        items
    }
}

// === API responses ===

/// Thumbnail URLs in the three sizes the API provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbs {
    pub large: String,
    pub original: String,
    pub small: String,
}

/// One wallpaper entry as returned by `/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallpaperSummary {
    pub id: String,
    /// Wallhaven page for this wallpaper
    pub url: String,
    pub short_url: String,
    pub views: u64,
    pub favorites: u64,
    pub source: String,
    pub purity: String,
    pub category: String,
    pub dimension_x: u32,
    pub dimension_y: u32,
    pub resolution: String,
    pub ratio: String,
    pub file_size: u64,
    /// MIME type, e.g. `image/jpeg`
    pub file_type: String,
    pub created_at: String,
    /// Dominant colours as `#rrggbb`
    pub colors: Vec<String>,
    /// Direct URL of the full-size image
    pub path: String,
    pub thumbs: Thumbs,
}

impl WallpaperSummary {
    /// File extension derived from the declared MIME type (`image/png` -> `png`).
    pub fn file_extension(&self) -> &str {
        self.file_type
            .rsplit('/')
            .next()
            .filter(|ext| !ext.is_empty())
            .unwrap_or("jpg")
    }

    /// Filename used inside the wallpaper directory.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.file_extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uploader {
    pub username: String,
    pub group: String,
    /// Avatar URLs keyed by size (e.g. `"32px"`)
    #[serde(default)]
    pub avatar: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallpaperTag {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub category_id: u64,
    pub category: String,
    pub purity: String,
    pub created_at: String,
}

/// Full record from `/w/{id}`: a summary plus uploader and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallpaperDetail {
    #[serde(flatten)]
    pub summary: WallpaperSummary,
    #[serde(default)]
    pub uploader: Option<Uploader>,
    #[serde(default)]
    pub tags: Option<Vec<WallpaperTag>>,
}

impl From<WallpaperDetail> for WallpaperSummary {
    fn from(detail: WallpaperDetail) -> Self {
        detail.summary
    }
}

/// Pagination metadata from `/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMeta {
    pub current_page: u32,
    pub last_page: u32,
    /// Sent as a number or as a numeric string depending on the endpoint version
    #[serde(deserialize_with = "lenient_u32")]
    pub per_page: u32,
    pub total: u64,
    /// Echoed query; tag lookups echo an object, which is dropped
    #[serde(default, deserialize_with = "string_or_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub seed: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub data: Vec<WallpaperSummary>,
    pub meta: SearchMeta,
}

/// `/w/{id}` wraps its record in a `data` field.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DetailEnvelope {
    pub data: WallpaperDetail,
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u32),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn string_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

// === Local wallpapers ===

/// A wallpaper imported from the local filesystem.
///
/// Width, height and size are probed once at import time. Two entries are
/// equal when their identifiers match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalWallpaper {
    pub id: String,
    pub path: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub added_at: DateTime<Utc>,
}

impl LocalWallpaper {
    /// Builds an entry for `path`, probing the image header and file metadata.
    ///
    /// Unreadable files still produce an entry with zero dimensions/size, so
    /// an import never fails because of a broken image.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (width, height) = image::image_dimensions(path).unwrap_or((0, 0));
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.to_string_lossy().to_string(),
            name,
            width,
            height,
            file_size,
            added_at: Utc::now(),
        }
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Identifier recorded in the settings when this file is chosen for a mode.
    pub fn selection_id(&self) -> String {
        format!("{LOCAL_ID_PREFIX}{}", self.id)
    }
}

impl PartialEq for LocalWallpaper {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LocalWallpaper {}

/// Prefix marking a per-mode selection as a local file rather than a remote id.
pub const LOCAL_ID_PREFIX: &str = "local:";

// === Appearance ===

/// System light/dark theme; picks which wallpaper variant is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppearanceMode {
    #[default]
    Light,
    Dark,
}

impl AppearanceMode {
    pub fn from_is_dark(is_dark: bool) -> Self {
        if is_dark {
            Self::Dark
        } else {
            Self::Light
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for AppearanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AppearanceMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(ParseError::Mode(other.to_string())),
        }
    }
}

// === Display helpers ===

/// Formats a count compactly: `999`, `1.2K`, `3.4M`.
pub fn format_compact(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Formats a byte count with decimal units (`2.4 MB`).
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1_000 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / 1_000.0;
    let mut unit = 0;
    while value >= 1_000.0 && unit < UNITS.len() - 1 {
        value /= 1_000.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
