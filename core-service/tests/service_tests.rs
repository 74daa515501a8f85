//! End-to-end tests over a real database file and the desktop bridges.

#![cfg(feature = "desktop-shims")]

use bridge_traits::playback::{PreloadEngine, PreloadItem};
use core_library::models::{collect_files, MediaType, Visibility};
use core_library::SqliteAdapter;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, IndexEvent};
use core_service::bridge_desktop::GrantedPathsPermissions;
use core_service::{CoreError, CoreService};
use core_sync::{DataChanged, SortType};
use mockall::mock;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

mock! {
    pub Engine {}

    impl PreloadEngine for Engine {
        fn add(&self, item: &PreloadItem, ranking: usize);
        fn remove(&self, item: &PreloadItem);
        fn set_current_playing_index(&self, index: usize);
        fn invalidate(&self);
    }
}

struct Fixture {
    _dir: TempDir,
    media: PathBuf,
    database: PathBuf,
    permissions: GrantedPathsPermissions,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("Camera");
        std::fs::create_dir_all(media.join("trip")).unwrap();
        std::fs::write(media.join("a.jpg"), b"jpeg").unwrap();
        std::fs::write(media.join("notes.txt"), b"text").unwrap();
        std::fs::write(media.join("trip").join("b.mp4"), b"mp4").unwrap();
        std::fs::write(media.join("trip").join("c.png"), b"png").unwrap();

        let permissions = GrantedPathsPermissions::new();
        permissions.grant(locator(&media)).await;

        Self {
            database: dir.path().join("index.db"),
            _dir: dir,
            media,
            permissions,
        }
    }

    fn config(&self) -> CoreConfig {
        CoreConfig::builder()
            .database_path(&self.database)
            .permission_provider(Arc::new(self.permissions.clone()))
            .cache_batch_size(2)
            .build()
            .unwrap()
    }

    fn root(&self) -> String {
        locator(&self.media)
    }
}

fn locator(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn names(core: &CoreService, media_type: MediaType) -> Vec<String> {
    core.gallery(Visibility::Public, media_type)
        .files()
        .iter()
        .map(|file| file.info.name.clone())
        .collect()
}

#[tokio::test]
async fn test_index_survives_restart() {
    let fixture = Fixture::new().await;

    let core = CoreService::bootstrap(fixture.config()).await.unwrap();
    let root = core.store(Visibility::Public).add(&fixture.root()).await.unwrap();
    assert_eq!(root.display_name, "Camera");

    let images = core.gallery(Visibility::Public, MediaType::Image);
    assert!(images.load(SortType::NameAsc).await);
    assert_eq!(names(&core, MediaType::Image), vec!["a.jpg", "c.png"]);
    let videos = core.gallery(Visibility::Public, MediaType::Video);
    assert!(videos.load(SortType::NameAsc).await);
    assert_eq!(names(&core, MediaType::Video), vec!["b.mp4"]);
    core.shutdown().await.unwrap();

    std::fs::remove_file(fixture.media.join("a.jpg")).unwrap();

    let restarted = CoreService::bootstrap(fixture.config()).await.unwrap();
    let mut events = restarted.events().subscribe();
    let images = restarted.gallery(Visibility::Public, MediaType::Image);
    assert!(images.load(SortType::NameAsc).await);
    assert_eq!(
        names(&restarted, MediaType::Image),
        vec!["a.jpg", "c.png"],
        "warm start serves the persisted snapshot"
    );

    let mut from_cache = None;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Index(IndexEvent::LoadCompleted { from_cache: cached, .. }) = event {
            from_cache = Some(cached);
        }
    }
    assert_eq!(from_cache, Some(true));

    assert!(images.refresh(SortType::NameAsc).await);
    assert_eq!(names(&restarted, MediaType::Image), vec!["c.png"]);
    restarted.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_roots_with_the_same_layout_survive_restart() {
    let fixture = Fixture::new().await;
    let mut roots = Vec::new();
    for name in ["Camera2", "Phone"] {
        let root = fixture.media.with_file_name(name);
        std::fs::create_dir_all(root.join("trip")).unwrap();
        std::fs::write(root.join("a.jpg"), b"jpeg").unwrap();
        std::fs::write(root.join("trip").join("t.jpg"), b"jpeg").unwrap();
        fixture.permissions.grant(locator(&root)).await;
        roots.push(locator(&root));
    }

    let core = CoreService::bootstrap(fixture.config()).await.unwrap();
    let store = core.store(Visibility::Public);
    for root in &roots {
        store.add(root).await.unwrap();
    }
    assert!(store.refresh().await);
    assert_eq!(store.snapshot().file_count(), 4);
    core.shutdown().await.unwrap();

    let restarted = CoreService::bootstrap(fixture.config()).await.unwrap();
    let images = restarted.gallery(Visibility::Public, MediaType::Image);
    assert!(images.load(SortType::NameAsc).await);
    assert_eq!(images.files().len(), 4);

    let trees = restarted.store(Visibility::Public).files();
    for root in &roots {
        let tree = trees.iter().find(|tree| &tree.locator == root).unwrap();
        let mut files = Vec::new();
        collect_files(&tree.children, &mut files);
        let mut names: Vec<&str> = files.iter().map(|file| file.info.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a.jpg", "t.jpg"], "{} keeps its own files", root);
    }
    restarted.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_revoked_root_disappears_on_refresh() {
    let fixture = Fixture::new().await;
    let core = CoreService::bootstrap(fixture.config()).await.unwrap();
    let store = core.store(Visibility::Private);
    store.add(&fixture.root()).await.unwrap();
    assert!(store.refresh().await);
    assert_eq!(store.snapshot().file_count(), 3);

    fixture.permissions.revoke(&fixture.root()).await;
    assert!(store.refresh().await);

    assert!(store.roots().is_empty());
    assert_eq!(store.snapshot().file_count(), 0);
    assert!(core.store(Visibility::Public).roots().is_empty());
    core.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_listener_spans_both_stores() {
    let fixture = Fixture::new().await;
    let database = Arc::new(SqliteAdapter::in_memory().await.unwrap());
    let core = CoreService::with_database(fixture.config(), database)
        .await
        .unwrap();

    let seen: Arc<Mutex<Vec<Visibility>>> = Arc::default();
    let sink = seen.clone();
    let listener = core
        .lifecycle_listener(Arc::new(move |change: &DataChanged| {
            sink.lock().push(change.visibility);
        }))
        .unwrap();
    listener.resume().unwrap();

    for visibility in [Visibility::Private, Visibility::Public] {
        let store = core.store(visibility);
        store.add(&fixture.root()).await.unwrap();
        assert!(store.fetch(false).await);
        // Listeners run on the load task after the fetch resolves
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(*seen.lock(), vec![Visibility::Private, Visibility::Public]);

    listener.destroy();
    assert_eq!(core.store(Visibility::Public).listener_count(), 0);
    assert_eq!(core.store(Visibility::Private).listener_count(), 0);
}

#[tokio::test]
async fn test_galleries_are_cached_per_visibility_and_type() {
    let fixture = Fixture::new().await;
    let database = Arc::new(SqliteAdapter::in_memory().await.unwrap());
    let core = CoreService::with_database(fixture.config(), database)
        .await
        .unwrap();

    let first = core.gallery(Visibility::Public, MediaType::Image);
    let again = core.gallery(Visibility::Public, MediaType::Image);
    let private = core.gallery(Visibility::Private, MediaType::Image);

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &private));
    assert_eq!(private.visibility(), Visibility::Private);
    core.health_check().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let fixture = Fixture::new().await;
    let mut config = fixture.config();
    config.index.cache_batch_size = 0;
    let database = Arc::new(SqliteAdapter::in_memory().await.unwrap());

    let result = CoreService::with_database(config, database).await;

    assert!(matches!(result, Err(CoreError::Config(_))));
}

#[tokio::test]
async fn test_preload_window_uses_configured_policy() {
    let fixture = Fixture::new().await;
    let database = Arc::new(SqliteAdapter::in_memory().await.unwrap());
    let core = CoreService::with_database(fixture.config(), database)
        .await
        .unwrap();

    let mut engine = MockEngine::new();
    engine.expect_add().times(3).return_const(());
    engine.expect_set_current_playing_index().times(1).return_const(());
    engine.expect_invalidate().times(1).return_const(());

    let window = core.preload_window(Arc::new(engine)).unwrap();
    let items = (0..5)
        .map(|i| PreloadItem::new(format!("/videos/{}.mp4", i)))
        .collect();
    window.reset(items, 2);

    assert_eq!(window.preloaded().len(), 3);
    assert_eq!(
        window.target_stage(4),
        core_playback::PreloadStage::TracksSelected
    );
}
