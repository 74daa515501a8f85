//! Lifecycle-aware listener behavior against real stores.

mod common;

use common::Harness;
use core_library::models::Visibility;
use core_sync::{ChangeKind, DataChanged, LifecycleDataChangedListener, LifecycleState, SyncError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn recorder() -> (Arc<Mutex<Vec<i64>>>, Arc<LifecycleDataChangedListener>) {
    let delivered: Arc<Mutex<Vec<i64>>> = Arc::default();
    let sink = delivered.clone();
    let listener = LifecycleDataChangedListener::new(Arc::new(move |change: &DataChanged| {
        sink.lock().push(change.data_version);
    }));
    (delivered, listener)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_suspended_changes_flush_on_resume() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    let (delivered, listener) = recorder();
    listener.register(&store).unwrap();
    assert_eq!(listener.state(), LifecycleState::Suspended);

    store.add("tree/camera").await.unwrap();
    assert!(store.fetch(false).await);
    settle().await;
    assert!(delivered.lock().is_empty());

    listener.resume().unwrap();

    assert_eq!(*delivered.lock(), vec![2], "one flush with the current version");
    assert_eq!(listener.delivered_version(store.id()), Some(2));
}

#[tokio::test]
async fn test_active_listener_receives_each_load() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    let (delivered, listener) = recorder();
    listener.register(&store).unwrap();
    listener.resume().unwrap();

    store.add("tree/camera").await.unwrap();
    assert!(store.fetch(false).await);
    settle().await;
    assert!(store.refresh().await);
    settle().await;

    assert_eq!(*delivered.lock(), vec![2, 3]);
}

#[tokio::test]
async fn test_root_changes_reach_raw_listeners_only() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    let (delivered, listener) = recorder();
    listener.register(&store).unwrap();
    listener.resume().unwrap();

    let kinds: Arc<Mutex<Vec<ChangeKind>>> = Arc::default();
    let sink = kinds.clone();
    store.register_listener(Arc::new(move |change: &DataChanged| {
        sink.lock().push(change.kind);
    }));

    store.add("tree/camera").await.unwrap();
    assert!(store.remove("tree/camera").await.unwrap());
    store.add("tree/camera").await.unwrap();

    assert_eq!(*kinds.lock(), vec![ChangeKind::RootsChanged; 3]);
    assert!(delivered.lock().is_empty(), "version never moved");
    assert_eq!(listener.delivered_version(store.id()), None);

    assert!(store.fetch(false).await);
    settle().await;
    assert_eq!(*delivered.lock(), vec![2]);
    assert_eq!(kinds.lock().last(), Some(&ChangeKind::Loaded));
}

#[tokio::test]
async fn test_resume_ignores_root_changes_while_suspended() {
    let harness = Harness::new().await;
    harness.seed_camera();
    let store = harness.store(Visibility::Public);
    let (delivered, listener) = recorder();
    listener.register(&store).unwrap();
    listener.resume().unwrap();

    store.add("tree/camera").await.unwrap();
    assert!(store.fetch(false).await);
    settle().await;
    listener.suspend().unwrap();
    assert!(store.remove("tree/camera").await.unwrap());
    listener.resume().unwrap();

    assert_eq!(*delivered.lock(), vec![2]);
}

#[tokio::test]
async fn test_destroy_unregisters_from_every_store() {
    let harness = Harness::new().await;
    let public = harness.store(Visibility::Public);
    let private = harness.store(Visibility::Private);
    let (delivered, listener) = recorder();
    listener.register(&public).unwrap();
    listener.register(&private).unwrap();
    listener.register(&public).unwrap();
    assert_eq!(public.listener_count(), 1);

    listener.destroy();

    assert_eq!(public.listener_count(), 0);
    assert_eq!(private.listener_count(), 0);
    assert_eq!(listener.state(), LifecycleState::Destroyed);
    assert!(matches!(
        listener.resume(),
        Err(SyncError::InvalidStateTransition { .. })
    ));
    assert!(listener.register(&public).is_err());
    assert!(delivered.lock().is_empty());
}
