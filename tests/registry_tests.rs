//! Integration tests for the endpoint registry and directory discovery.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_for, MockEndpoint};
use dpdk_telemetry_exporter::telemetry::{
    scan_existing, DirectoryWatcher, EndpointRegistry, PollerSettings, PollerState,
    DEFAULT_SOCKET_NAME,
};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

fn settings() -> PollerSettings {
    PollerSettings {
        interval: Duration::from_millis(100),
        backoff: Duration::from_millis(50),
        io_timeout: Duration::from_millis(500),
        capture_port_info: false,
    }
}

fn registry() -> EndpointRegistry {
    EndpointRegistry::new(settings(), Duration::from_secs(2))
}

#[tokio::test]
async fn test_snapshot_reads_published_data() {
    let mock = MockEndpoint::start(2);
    let registry = registry();
    registry.add_endpoint("app", mock.path()).await;

    assert!(wait_for(WAIT, || registry.get_snapshot("app").is_some_and(|v| v.ok())).await);
    let view = registry.get_snapshot("app").unwrap();
    assert_eq!(view.name, "app");
    assert_eq!(view.path, mock.path());
    assert_eq!(view.snapshot.unwrap().sample.len(), 2);

    registry.shutdown().await;
    assert!(registry.is_empty());
    assert!(wait_for(WAIT, || mock.active() == 0).await);
}

#[tokio::test]
async fn test_replace_closes_previous_session() {
    let first = MockEndpoint::start(1);
    let second = MockEndpoint::start(1);
    let registry = registry();

    registry.add_endpoint("app", first.path()).await;
    assert!(wait_for(WAIT, || first.active() == 1).await);

    let replaced = registry.add_endpoint("app", second.path()).await;
    // The old poller is fully stopped before the new one starts.
    assert!(wait_for(WAIT, || first.active() == 0).await);
    assert_eq!(registry.len(), 1);
    assert_eq!(replaced.path(), second.path());

    assert!(wait_for(WAIT, || second.active() == 1).await);
    assert!(wait_for(WAIT, || registry.get_snapshot("app").is_some_and(|v| v.ok())).await);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_remove_stops_poller() {
    let mock = MockEndpoint::start(1);
    let registry = registry();

    let state = registry.add_endpoint("app", mock.path()).await;
    assert!(wait_for(WAIT, || mock.active() == 1).await);

    assert!(registry.remove_endpoint("app").await);
    assert_eq!(state.status().state, PollerState::Stopped);
    assert!(registry.get_snapshot("app").is_none());
    assert!(wait_for(WAIT, || mock.active() == 0).await);

    assert!(!registry.remove_endpoint("app").await);
}

#[tokio::test]
async fn test_unreachable_endpoint_does_not_block_others() {
    let mock = MockEndpoint::start(1);
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();

    registry
        .add_endpoint("down", dir.path().join(DEFAULT_SOCKET_NAME))
        .await;
    registry.add_endpoint("up", mock.path()).await;

    assert!(wait_for(WAIT, || registry.get_snapshot("up").is_some_and(|v| v.ok())).await);
    let down = registry.get_snapshot("down").unwrap();
    assert!(!down.ok());
    assert_eq!(registry.list_endpoints(), vec!["down", "up"]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_scan_existing_registers_directories() {
    let root = tempfile::tempdir().unwrap();
    let (_, _mock_a) = MockEndpoint::in_root(root.path(), "rte", 1);
    let (_, _mock_b) = MockEndpoint::in_root(root.path(), "pktgen", 1);
    std::fs::write(root.path().join("not-an-app"), b"").unwrap();

    let registry = registry();
    let found = scan_existing(&registry, root.path(), DEFAULT_SOCKET_NAME)
        .await
        .unwrap();
    assert_eq!(found, 2);
    assert_eq!(registry.list_endpoints(), vec!["pktgen", "rte"]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_watcher_follows_directory_changes() {
    let root = tempfile::tempdir().unwrap();
    let registry = Arc::new(registry());
    let shutdown = CancellationToken::new();
    let watcher = DirectoryWatcher::start(
        registry.clone(),
        root.path(),
        DEFAULT_SOCKET_NAME,
        shutdown.clone(),
    )
    .unwrap();

    let (app_dir, mock) = MockEndpoint::in_root(root.path(), "rte", 1);
    assert!(wait_for(WAIT, || registry.get_snapshot("rte").is_some_and(|v| v.ok())).await);

    std::fs::remove_dir_all(&app_dir).unwrap();
    assert!(wait_for(WAIT, || registry.get_snapshot("rte").is_none()).await);
    drop(mock);

    shutdown.cancel();
    watcher.stop().await;
    registry.shutdown().await;
}

#[tokio::test]
async fn test_watch_then_scan_registers_each_directory_once() {
    let root = tempfile::tempdir().unwrap();
    let (_, _early) = MockEndpoint::in_root(root.path(), "early", 1);
    let registry = Arc::new(registry());
    let shutdown = CancellationToken::new();
    let watcher = DirectoryWatcher::start(
        registry.clone(),
        root.path(),
        DEFAULT_SOCKET_NAME,
        shutdown.clone(),
    )
    .unwrap();

    // Created after the watch started but before the scan: seen by both.
    let (_, _late) = MockEndpoint::in_root(root.path(), "late", 1);
    let found = scan_existing(&registry, root.path(), DEFAULT_SOCKET_NAME)
        .await
        .unwrap();
    assert_eq!(found, 2);

    assert!(
        wait_for(WAIT, || {
            ["early", "late"]
                .iter()
                .all(|name| registry.get_snapshot(name).is_some_and(|v| v.ok()))
        })
        .await
    );
    assert_eq!(registry.list_endpoints(), vec!["early", "late"]);

    shutdown.cancel();
    watcher.stop().await;
    registry.shutdown().await;
}
