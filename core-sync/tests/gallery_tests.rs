//! Gallery projection over a loaded store.

mod common;

use common::Harness;
use core_library::models::{MediaType, Visibility};
use core_sync::{DirectoryScope, Gallery, SortType};
use futures::future::join;
use std::time::Duration;

fn names(gallery: &Gallery) -> Vec<String> {
    gallery
        .files()
        .iter()
        .map(|file| file.info.name.clone())
        .collect()
}

#[tokio::test]
async fn test_empty_gallery_loads_store() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    store.add("tree/camera").await.unwrap();
    let images = Gallery::new(store.clone(), MediaType::Image);

    assert!(images.load(SortType::default()).await);

    assert_eq!(store.data_version(), 2);
    assert_eq!(names(&images), vec!["new.jpg", "old.jpg"]);
    assert_eq!(images.sort_type(), SortType::DateDesc);
    assert_eq!(images.directory_trees().len(), 1);
    assert_eq!(images.file(1).map(|f| f.info.doc_id), Some("old.jpg".to_string()));
    assert!(images.file(2).is_none());
}

#[tokio::test]
async fn test_sort_orders() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    store.add("tree/camera").await.unwrap();
    let images = Gallery::new(store, MediaType::Image);

    assert!(images.load(SortType::DateAsc).await);
    assert_eq!(names(&images), vec!["old.jpg", "new.jpg"]);

    assert!(images.load(SortType::NameDesc).await);
    assert_eq!(names(&images), vec!["old.jpg", "new.jpg"]);

    assert!(images.load(SortType::Random).await);
    let mut shuffled = names(&images);
    shuffled.sort();
    assert_eq!(shuffled, vec!["new.jpg", "old.jpg"]);
}

#[tokio::test]
async fn test_directory_scope_limits_files() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    store.add("tree/camera").await.unwrap();
    let images = Gallery::new(store.clone(), MediaType::Image);
    assert!(images.load(SortType::NameAsc).await);

    images.set_root_directory(Some(DirectoryScope::directory("tree/camera", "trip")));
    assert!(images.load(SortType::NameAsc).await);
    assert_eq!(names(&images), vec!["new.jpg"]);

    images.set_root_directory(Some(DirectoryScope::directory("tree/camera", "missing")));
    assert!(images.load(SortType::NameAsc).await);
    assert!(images.files().is_empty());
    assert_eq!(store.data_version(), 2, "scoped empty result does not reload");

    images.set_root_directory(Some(DirectoryScope::root("tree/camera")));
    assert!(images.load(SortType::NameAsc).await);
    assert_eq!(names(&images), vec!["new.jpg", "old.jpg"]);
}

#[tokio::test]
async fn test_video_gallery_only_sees_videos() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Private);
    store.add("tree/camera").await.unwrap();
    let videos = Gallery::new(store, MediaType::Video);

    assert!(videos.load(SortType::DateDesc).await);

    assert_eq!(names(&videos), vec!["clip.mp4"]);
    assert_eq!(videos.visibility(), Visibility::Private);
}

#[tokio::test]
async fn test_concurrent_loads_share_one_store_load() {
    let harness = Harness::new().await;
    harness.seed_camera();
    harness.documents.set_delay(Duration::from_millis(20));
    let store = harness.store(Visibility::Public);
    store.add("tree/camera").await.unwrap();
    let images = Gallery::new(store.clone(), MediaType::Image);

    let (first, second) = join(
        images.load(SortType::DateDesc),
        images.load(SortType::DateDesc),
    )
    .await;

    assert!(first && second);
    assert_eq!(harness.documents.calls(), 2);
    assert_eq!(store.data_version(), 2);
}

#[tokio::test]
async fn test_refresh_reports_store_result() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    store.add("tree/camera").await.unwrap();
    let images = Gallery::new(store.clone(), MediaType::Image);
    assert!(images.load(SortType::DateDesc).await);

    harness.documents.set_listing(
        "tree/camera",
        "",
        vec![common::media("fresh.png", "image/png", 900)],
    );
    assert!(images.refresh(SortType::DateDesc).await);
    assert_eq!(names(&images), vec!["fresh.png"]);

    harness.permissions.set_failing(true);
    assert!(!images.refresh(SortType::DateDesc).await);
    assert_eq!(names(&images), vec!["fresh.png"], "previous data kept");
}
