//! Invalidation channel tests
//!
//! Listener-driven reloads, lag recovery and shutdown.

mod common;

use common::seeded_source;
use iam_authz::{spawn_listener, IndexConfig, InvalidationBus, PolicyIndexManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Poll until `condition` holds or the deadline passes
async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_listener_reloads_named_namespace() {
    let source = seeded_source(&["ns", "other"]).await;
    let manager = Arc::new(PolicyIndexManager::new(source.clone(), IndexConfig::default()));
    manager.initialize().await.unwrap();

    let bus = InvalidationBus::from_config(manager.config());
    let listener = spawn_listener(Arc::clone(&manager), bus.subscribe());

    source.edges().grant_role("ns", "g2", "r1").await;
    assert_eq!(bus.publish("ns"), 1);

    let reloaded = eventually(|| manager.get("ns").unwrap().check_access("g2", "p1")).await;
    assert!(reloaded, "listener should reload the invalidated namespace");
    assert_eq!(manager.get("other").unwrap().generation(), 1);

    drop(bus);
    timeout(Duration::from_secs(1), listener)
        .await
        .expect("listener should stop when the bus closes")
        .unwrap();
}

#[tokio::test]
async fn test_listener_survives_failed_reload() {
    let source = seeded_source(&["ns"]).await;
    let manager = Arc::new(PolicyIndexManager::new(source.clone(), IndexConfig::default()));
    manager.initialize().await.unwrap();

    let bus = InvalidationBus::new("test.invalidate", 16);
    let _listener = spawn_listener(Arc::clone(&manager), bus.subscribe());

    source.fail("ns", "down");
    bus.publish("ns");
    assert!(eventually(|| manager.metrics().builds_failed == 1).await);
    assert!(manager.get("ns").unwrap().check_access("g1", "p1"));

    source.heal("ns");
    source.edges().grant_role("ns", "g2", "r1").await;
    bus.publish_payload(b"ns").unwrap();

    assert!(eventually(|| manager.get("ns").unwrap().check_access("g2", "p1")).await);
}

#[tokio::test]
async fn test_lagged_listener_reloads_everything() {
    let source = seeded_source(&["a", "b"]).await;
    let manager = Arc::new(PolicyIndexManager::new(source.clone(), IndexConfig::default()));
    manager.initialize().await.unwrap();

    let bus = InvalidationBus::new("test.invalidate", 1);
    let receiver = bus.subscribe();

    source.edges().grant_role("a", "g2", "r1").await;
    source.edges().grant_role("b", "g2", "r1").await;
    // Overflow the single-slot buffer before the listener starts
    bus.publish("a");
    bus.publish("b");
    bus.publish("b");

    let _listener = spawn_listener(Arc::clone(&manager), receiver);

    let both = eventually(|| {
        manager.get("a").unwrap().check_access("g2", "p1")
            && manager.get("b").unwrap().check_access("g2", "p1")
    })
    .await;
    assert!(both, "lag recovery should reload every namespace");
}

#[tokio::test]
async fn test_listener_survives_panicking_source() {
    let source = seeded_source(&["ns"]).await;
    let manager = Arc::new(PolicyIndexManager::new(source.clone(), IndexConfig::default()));
    manager.initialize().await.unwrap();

    let bus = InvalidationBus::new("test.invalidate", 16);
    let listener = spawn_listener(Arc::clone(&manager), bus.subscribe());

    source.panic_on("ns", "edge driver crashed");
    assert_eq!(bus.publish("ns"), 1);
    assert!(eventually(|| manager.metrics().builds_failed == 1).await);
    assert!(!listener.is_finished());
    assert_eq!(
        manager.status("ns").unwrap().state,
        iam_authz::NamespaceState::Ready
    );

    source.heal("ns");
    source.edges().grant_role("ns", "g2", "r1").await;
    assert_eq!(bus.publish("ns"), 1, "listener should still be subscribed");

    assert!(eventually(|| manager.get("ns").unwrap().check_access("g2", "p1")).await);
}
