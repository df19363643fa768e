//! # Wallhaven API Client
//!
//! Handles communication with the Wallhaven gallery API: searching, fetching
//! single wallpaper records and downloading the image files.
//!
//! ## API Endpoints
//! ```text
//! GET {base}/search?q=&categories=&purity=&sorting=&order=&topRange=&atleast=
//!                   &resolutions=&ratios=&colors=&page=&seed=&apikey=
//! GET {base}/w/{id}?apikey=
//! GET {path}                       (image bytes, `path` comes from a record)
//! ```
//!
//! Every call is an independent request/response pair. The only shared state
//! is the `reqwest::Client` (connection pool, 30 second timeout). Nothing is
//! retried; the caller decides what to do with an error.

use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::DEFAULT_API_BASE_URL;
use crate::error::GalleryError;
use crate::models::{
    DetailEnvelope, SearchPage, SearchQuery, Sorting, WallpaperDetail, WallpaperSummary,
};

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The three gallery operations the rest of the app depends on.
///
/// [`WallhavenClient`] is the real implementation; tests substitute doubles
/// that count calls or fail on demand.
pub trait Gallery: Send + Sync {
    fn search(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<SearchPage, GalleryError>> + Send;

    fn get_detail(
        &self,
        id: &str,
        api_key: Option<&str>,
    ) -> impl Future<Output = Result<WallpaperDetail, GalleryError>> + Send;

    /// Fetches `source_url` and atomically replaces `destination` with it.
    fn download(
        &self,
        source_url: &str,
        destination: &Path,
    ) -> impl Future<Output = Result<(), GalleryError>> + Send;
}

/// Creates an HTTP client with appropriate timeout settings.
fn create_client() -> Result<reqwest::Client, GalleryError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("cosmic-wallhaven-wallpaper/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GalleryError::InvalidRequest(format!("Failed to create HTTP client: {e}")))
}

/// HTTP implementation of [`Gallery`].
#[derive(Debug, Clone)]
pub struct WallhavenClient {
    http: reqwest::Client,
    base_url: String,
}

impl WallhavenClient {
    /// Client for the public Wallhaven API.
    pub fn new() -> Result<Self, GalleryError> {
        Self::with_base_url(DEFAULT_API_BASE_URL)
    }

    /// Client for another API root (mirrors, local fixtures).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, GalleryError> {
        Ok(Self::with_http_client(create_client()?, base_url))
    }

    /// Uses a caller-built `reqwest::Client` instead of the default one.
    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// GETs `url` and decodes a JSON body of type `T`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, GalleryError> {
        debug!(url, "GET");
        let response = self.http.get(url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "Request rejected");
            return Err(GalleryError::from_status(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(GalleryError::Decode)
    }
}

impl Gallery for WallhavenClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, GalleryError> {
        let url = format!("{}/search", self.base_url);
        self.fetch(&url, &query.to_query_items()).await
    }

    async fn get_detail(
        &self,
        id: &str,
        api_key: Option<&str>,
    ) -> Result<WallpaperDetail, GalleryError> {
        let url = format!("{}/w/{}", self.base_url, id);
        let params: Vec<(&'static str, String)> = api_key
            .map(|key| vec![("apikey", key.to_string())])
            .unwrap_or_default();

        let envelope: DetailEnvelope = self.fetch(&url, &params).await?;
        Ok(envelope.data)
    }

    async fn download(&self, source_url: &str, destination: &Path) -> Result<(), GalleryError> {
        debug!(url = source_url, "Downloading");
        let mut response = self.http.get(source_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GalleryError::from_status(status));
        }

        // Stream into a temp file in the same directory so the final rename
        // stays on one filesystem. Dropping it on any error removes it.
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            tmp.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        tmp.flush()?;

        tmp.persist(destination).map_err(|e| e.error)?;
        info!(path = %destination.display(), bytes = written, "Download complete");
        Ok(())
    }
}

/// Walks the pages of one search, accumulating results.
///
/// For random sorting, the seed returned by the first page is sent with every
/// following page so the server keeps the same shuffle and pages neither
/// repeat nor skip entries.
#[derive(Debug, Clone)]
pub struct SearchPager {
    base: SearchQuery,
    current_page: u32,
    has_more: bool,
    seed: Option<String>,
    results: Vec<WallpaperSummary>,
}

impl SearchPager {
    pub fn new(base: SearchQuery) -> Self {
        let seed = base.seed.clone();
        Self {
            base,
            current_page: 0,
            has_more: true,
            seed,
            results: Vec::new(),
        }
    }

    /// Requests page 1, replacing anything loaded before.
    pub async fn load_first<G: Gallery>(&mut self, gallery: &G) -> Result<usize, GalleryError> {
        self.results.clear();
        self.current_page = 0;
        self.has_more = true;
        if self.base.seed.is_none() {
            self.seed = None;
        }
        self.load_page(gallery, 1).await
    }

    /// Requests the page after the last one loaded; returns how many entries
    /// were appended (0 once the last page has been reached).
    pub async fn load_next<G: Gallery>(&mut self, gallery: &G) -> Result<usize, GalleryError> {
        if !self.has_more {
            return Ok(0);
        }
        self.load_page(gallery, self.current_page + 1).await
    }

    async fn load_page<G: Gallery>(&mut self, gallery: &G, page: u32) -> Result<usize, GalleryError> {
        let mut query = self.base.clone();
        query.page = page;
        if query.sorting == Sorting::Random {
            query.seed = self.seed.clone();
        }

        // Page counter only advances once the request succeeded
        let response = gallery.search(&query).await?;

        if self.base.sorting == Sorting::Random && self.seed.is_none() {
            self.seed = response.meta.seed.clone();
        }
        self.current_page = page;
        self.has_more = page < response.meta.last_page;

        let added = response.data.len();
        self.results.extend(response.data);
        Ok(added)
    }

    pub fn results(&self) -> &[WallpaperSummary] {
        &self.results
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn seed(&self) -> Option<&str> {
        self.seed.as_deref()
    }
}
