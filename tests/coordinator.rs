mod common;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cosmic_wallhaven_wallpaper::appearance::{run_appearance_loop, AppearanceSource, ThemeSignals};
use cosmic_wallhaven_wallpaper::models::{SearchPage, LOCAL_ID_PREFIX};
use cosmic_wallhaven_wallpaper::settings::MemoryBackend;
use cosmic_wallhaven_wallpaper::{
    AppearanceMode, Gallery, GalleryError, SearchQuery, SetterError, SettingsStore,
    WallpaperCoordinator, WallpaperDetail, WallpaperError,
};

/// Gallery double: details are synthesized, downloads write a stub file.
#[derive(Default)]
struct FakeGallery {
    failing: HashSet<String>,
    downloads: AtomicUsize,
    detail_requests: Mutex<Vec<(String, Option<String>)>>,
    search_keys: Mutex<Vec<Option<String>>>,
    downloads_fail: bool,
}

impl FakeGallery {
    fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl Gallery for FakeGallery {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, GalleryError> {
        self.search_keys.lock().unwrap().push(query.api_key.clone());
        Err(GalleryError::Http(503))
    }

    async fn get_detail(
        &self,
        id: &str,
        api_key: Option<&str>,
    ) -> Result<WallpaperDetail, GalleryError> {
        self.detail_requests
            .lock()
            .unwrap()
            .push((id.to_string(), api_key.map(str::to_string)));
        if self.failing.contains(id) {
            return Err(GalleryError::Http(404));
        }
        Ok(serde_json::from_value(common::summary_json(id, "https://w.example.invalid")).unwrap())
    }

    async fn download(&self, _source_url: &str, destination: &Path) -> Result<(), GalleryError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.downloads_fail {
            return Err(GalleryError::RateLimited);
        }
        std::fs::write(destination, b"image")?;
        Ok(())
    }
}

#[derive(Default, Clone)]
struct FakeSetter {
    applied: Arc<Mutex<Vec<PathBuf>>>,
    fails: bool,
}

impl cosmic_wallhaven_wallpaper::setter::WallpaperSetter for FakeSetter {
    fn apply(&self, image_path: &Path) -> Result<(), SetterError> {
        self.applied.lock().unwrap().push(image_path.to_path_buf());
        if self.fails {
            return Err(SetterError::NoHomeDir);
        }
        Ok(())
    }
}

struct Harness {
    coordinator: WallpaperCoordinator<FakeGallery, FakeSetter>,
    applied: Arc<Mutex<Vec<PathBuf>>>,
    backend: Arc<MemoryBackend>,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(gallery: FakeGallery, appearance: AppearanceMode) -> Self {
        Self::with_setter(gallery, FakeSetter::default(), appearance)
    }

    fn with_setter(gallery: FakeGallery, setter: FakeSetter, appearance: AppearanceMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let applied = setter.applied.clone();
        let coordinator = WallpaperCoordinator::new(
            SettingsStore::open(backend.clone()),
            gallery,
            setter,
            dir.path(),
            appearance,
        );
        Self { coordinator, applied, backend, dir }
    }

    fn applied(&self) -> Vec<PathBuf> {
        self.applied.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn remote_wallpaper_is_downloaded_once() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Dark);

    let path = h
        .coordinator
        .set_remote_wallpaper("a1", AppearanceMode::Dark)
        .await
        .unwrap();
    // image/jpeg records are stored as `{id}.jpeg`
    assert_eq!(path, h.dir.path().join("a1.jpeg"));
    assert!(path.exists());
    assert_eq!(h.applied(), [path.clone()]);

    // Same wallpaper for the other mode reuses the file and is not applied
    h.coordinator
        .set_remote_wallpaper("a1", AppearanceMode::Light)
        .await
        .unwrap();
    assert_eq!(h.coordinator.gallery().downloads.load(Ordering::SeqCst), 1);
    assert_eq!(h.applied().len(), 1);

    let settings = h.coordinator.settings();
    assert_eq!(settings.light_wallpaper_id.as_deref(), Some("a1"));
    assert_eq!(settings.dark_wallpaper_id.as_deref(), Some("a1"));
}

#[tokio::test]
async fn failed_lookup_leaves_settings_untouched() {
    let h = Harness::new(FakeGallery::failing(&["gone"]), AppearanceMode::Light);

    let err = h
        .coordinator
        .set_remote_wallpaper("gone", AppearanceMode::Light)
        .await
        .unwrap_err();
    assert!(matches!(err, WallpaperError::Gallery(GalleryError::Http(404))), "got {err:?}");
    assert_eq!(h.coordinator.settings().light_wallpaper_path, None);
    assert!(h.applied().is_empty());
}

#[tokio::test]
async fn failed_download_commits_nothing() {
    let gallery = FakeGallery {
        downloads_fail: true,
        ..FakeGallery::default()
    };
    let h = Harness::new(gallery, AppearanceMode::Dark);

    let err = h
        .coordinator
        .set_remote_wallpaper("a1", AppearanceMode::Dark)
        .await
        .unwrap_err();
    assert!(matches!(err, WallpaperError::Gallery(GalleryError::RateLimited)), "got {err:?}");

    let settings = h.coordinator.settings();
    assert_eq!(settings.dark_wallpaper_path, None);
    assert_eq!(settings.dark_wallpaper_id, None);
    assert!(h.applied().is_empty());
    assert!(!h.dir.path().join("a1.jpeg").exists());
}

#[tokio::test]
async fn apply_failure_keeps_the_selection() {
    let setter = FakeSetter {
        fails: true,
        ..FakeSetter::default()
    };
    let h = Harness::with_setter(FakeGallery::default(), setter, AppearanceMode::Light);

    let err = h
        .coordinator
        .set_remote_wallpaper("a1", AppearanceMode::Light)
        .await
        .unwrap_err();
    assert!(matches!(err, WallpaperError::Apply(SetterError::NoHomeDir)), "got {err:?}");
    assert_eq!(h.applied().len(), 1);

    let settings = h.coordinator.settings();
    assert_eq!(settings.light_wallpaper_id.as_deref(), Some("a1"));
    let expected = h.dir.path().join("a1.jpeg");
    assert_eq!(settings.light_wallpaper_path.as_deref(), expected.to_str());
}

#[tokio::test]
async fn ids_that_escape_the_wallpaper_dir_are_rejected() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);

    for id in ["../escape", "nested/a1", "/etc/a1"] {
        let err = h
            .coordinator
            .set_remote_wallpaper(id, AppearanceMode::Light)
            .await
            .unwrap_err();
        assert!(matches!(err, WallpaperError::UnsafeFileName(_)), "{id}: got {err:?}");
    }

    assert_eq!(h.coordinator.gallery().downloads.load(Ordering::SeqCst), 0);
    assert_eq!(h.coordinator.settings().light_wallpaper_path, None);
    assert!(h.applied().is_empty());
}

#[tokio::test]
async fn stored_api_key_is_used_for_lookups() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);

    h.coordinator.set_api_key(Some("   ".to_string()));
    assert_eq!(h.coordinator.settings().api_key, None);

    h.coordinator.set_api_key(Some("k3y".to_string()));
    h.coordinator
        .set_remote_wallpaper("a1", AppearanceMode::Dark)
        .await
        .unwrap();

    let requests = h.coordinator.gallery().detail_requests.lock().unwrap().clone();
    assert_eq!(requests, [("a1".to_string(), Some("k3y".to_string()))]);
}

#[tokio::test]
async fn search_fills_in_stored_key_only_when_missing() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);
    h.coordinator.set_api_key(Some("stored".to_string()));

    let _ = h.coordinator.search(&SearchQuery::default()).await;
    let explicit = SearchQuery {
        api_key: Some("explicit".to_string()),
        ..SearchQuery::default()
    };
    let _ = h.coordinator.search(&explicit).await;

    let keys = h.coordinator.gallery().search_keys.lock().unwrap().clone();
    assert_eq!(keys, [Some("stored".to_string()), Some("explicit".to_string())]);
}

#[test]
fn toggling_a_favorite_twice_restores_the_list() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);

    assert!(h.coordinator.toggle_favorite("x1"));
    assert!(h.coordinator.is_favorite("x1"));
    assert!(!h.coordinator.toggle_favorite("x1"));
    assert!(h.coordinator.settings().favorites.is_empty());
}

#[test]
fn changes_reach_the_backend() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);
    h.coordinator.toggle_favorite("x1");
    h.coordinator.set_auto_switch(false);

    let persisted = SettingsStore::load(h.backend.as_ref());
    assert_eq!(persisted.favorites, ["x1"]);
    assert!(!persisted.auto_switch_enabled);
}

#[tokio::test]
async fn favorites_skip_entries_that_fail() {
    let h = Harness::new(FakeGallery::failing(&["bad"]), AppearanceMode::Light);
    for id in ["a1", "bad", "a3"] {
        h.coordinator.toggle_favorite(id);
    }

    let loaded = h.coordinator.load_favorites().await;
    let ids: Vec<&str> = loaded.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, ["a1", "a3"]);
}

#[tokio::test]
async fn clearing_keeps_the_file() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);
    let path = h
        .coordinator
        .set_remote_wallpaper("a1", AppearanceMode::Light)
        .await
        .unwrap();

    h.coordinator.clear_wallpaper(AppearanceMode::Light);
    let settings = h.coordinator.settings();
    assert_eq!(settings.light_wallpaper_path, None);
    assert_eq!(settings.light_wallpaper_id, None);
    assert!(path.exists());
}

#[tokio::test]
async fn appearance_change_respects_auto_switch() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);
    let dark = h
        .coordinator
        .set_remote_wallpaper("d1", AppearanceMode::Dark)
        .await
        .unwrap();
    assert!(h.applied().is_empty());

    assert!(h.coordinator.handle_appearance_change(AppearanceMode::Dark).unwrap());
    assert_eq!(h.applied(), [dark.clone()]);

    // Every change applies again
    assert!(h.coordinator.handle_appearance_change(AppearanceMode::Dark).unwrap());
    assert_eq!(h.applied().len(), 2);

    h.coordinator.set_auto_switch(false);
    assert!(!h.coordinator.handle_appearance_change(AppearanceMode::Light).unwrap());
    assert!(!h.coordinator.handle_appearance_change(AppearanceMode::Dark).unwrap());
    assert_eq!(h.applied().len(), 2);
    assert_eq!(h.coordinator.current_appearance(), AppearanceMode::Dark);
}

#[tokio::test]
async fn missing_file_is_not_applied() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Dark);
    let path = h
        .coordinator
        .set_remote_wallpaper("d1", AppearanceMode::Dark)
        .await
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(!h.coordinator.apply_for_current_appearance().unwrap());
    assert_eq!(h.applied().len(), 1);
}

#[test]
fn local_wallpapers_are_imported_once_and_applied() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);
    let image_path = h.dir.path().join("beach.png");
    image::RgbImage::new(16, 9).save(&image_path).unwrap();

    let local = h.coordinator.add_local_favorite(&image_path).unwrap();
    assert_eq!(local.resolution(), "16x9");
    assert!(h.coordinator.add_local_favorite(&image_path).is_none());

    h.coordinator
        .set_local_wallpaper_by_id(&local.id, AppearanceMode::Light)
        .unwrap();
    assert_eq!(h.applied(), [image_path.clone()]);

    let settings = h.coordinator.settings();
    assert!(settings
        .light_wallpaper_id
        .as_deref()
        .is_some_and(|id| id.starts_with(LOCAL_ID_PREFIX)));

    let err = h
        .coordinator
        .set_local_wallpaper_by_id("no-such-id", AppearanceMode::Dark)
        .unwrap_err();
    assert!(matches!(err, WallpaperError::UnknownLocal(_)), "got {err:?}");

    assert!(h.coordinator.remove_local_favorite(&local.id));
    assert!(h.coordinator.settings().local_favorites.is_empty());
}

struct SwitchableSource(Arc<AtomicBool>);

impl AppearanceSource for SwitchableSource {
    fn current(&self) -> AppearanceMode {
        AppearanceMode::from_is_dark(self.0.load(Ordering::SeqCst))
    }
}

#[tokio::test]
async fn appearance_loop_applies_on_each_signal() {
    let h = Harness::new(FakeGallery::default(), AppearanceMode::Light);
    let dark = h
        .coordinator
        .set_remote_wallpaper("d1", AppearanceMode::Dark)
        .await
        .unwrap();

    let Harness { coordinator, applied, dir: _dir, .. } = h;
    let coordinator = Arc::new(coordinator);

    let is_dark = Arc::new(AtomicBool::new(true));
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(()).unwrap();
    drop(tx);

    run_appearance_loop(
        coordinator.clone(),
        SwitchableSource(is_dark),
        ThemeSignals::from_receiver(rx),
    )
    .await;

    assert_eq!(coordinator.current_appearance(), AppearanceMode::Dark);
    assert_eq!(*applied.lock().unwrap(), [dark]);
}
