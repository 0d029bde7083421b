//! Shared connection behaviour seen through the coordinator
//!
//! Run with: cargo test --test integration_connection

mod common;

use common::{pay_info_trigger, settle, swap_trigger, HarnessBuilder};
use futures::future::join_all;
use std::time::Duration;
use tokio::time::Instant;
use walletnotify_core::{ConnectionError, ConnectionState, CoordinatorError, ShutdownReason};

#[tokio::test(start_paused = true)]
async fn test_concurrent_cold_start_connects_once() {
    let h = HarnessBuilder::new()
        .connect_delay(Duration::from_millis(500))
        .build();

    let triggers: Vec<_> = (0..6).map(|i| swap_trigger(&format!("swap-{}", i))).collect();
    let results = join_all(triggers.iter().map(|t| h.coordinator.on_trigger(t))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(h.sdk.connects(), 1);
    assert_eq!(h.session.listener_count(), 1);
    assert_eq!(h.coordinator.active_jobs().len(), 6);
    assert_eq!(h.coordinator.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_failed_connect_is_surfaced_and_next_trigger_retries() {
    let h = HarnessBuilder::new().connect_failures(1).build();

    let err = h
        .coordinator
        .on_trigger(&pay_info_trigger())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Connection(ConnectionError::Sdk(_))
    ));
    assert!(h.coordinator.active_jobs().is_empty());
    assert_eq!(h.coordinator.connection_state(), ConnectionState::Disconnected);

    h.coordinator.on_trigger(&pay_info_trigger()).await.unwrap();
    settle().await;

    assert_eq!(h.sdk.connects(), 2);
    assert_eq!(h.coordinator.connection_state(), ConnectionState::Connected);
    assert_eq!(h.bridge.replies.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_without_jobs_ends_after_empty_delay() {
    let h = HarnessBuilder::new().connect_failures(1).build();
    let start = Instant::now();

    assert!(h.coordinator.on_trigger(&swap_trigger("x")).await.is_err());

    assert_eq!(h.coordinator.terminated().await, ShutdownReason::EmptyDelay);
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert!(start.elapsed() < Duration::from_secs(61));
    assert_eq!(h.journal.count("sdk.disconnect"), 0);
}

#[tokio::test]
async fn test_connection_reused_across_job_lifetimes() {
    let h = HarnessBuilder::new().build();

    h.coordinator.on_trigger(&pay_info_trigger()).await.unwrap();
    settle().await;
    assert!(h.coordinator.active_jobs().is_empty());

    // Job set went empty but the connection stays up until shutdown.
    h.coordinator.on_trigger(&pay_info_trigger()).await.unwrap();
    settle().await;

    assert_eq!(h.sdk.connects(), 1);
    assert_eq!(h.journal.count("sdk.disconnect"), 0);

    h.coordinator.shutdown().await;
    assert_eq!(h.journal.count("sdk.disconnect"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_connecting_starts_nothing() {
    let h = HarnessBuilder::new()
        .with_nwc_plugin()
        .connect_delay(Duration::from_millis(500))
        .build();

    let trigger = swap_trigger("racing");
    let (result, ()) = tokio::join!(h.coordinator.on_trigger(&trigger), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.coordinator.shutdown().await;
    });
    settle().await;

    assert_eq!(result.unwrap_err(), CoordinatorError::ShutDown);
    assert!(h.coordinator.active_jobs().is_empty());
    assert_eq!(h.session.listener_count(), 0);
    assert_eq!(h.journal.entries(), vec!["sdk.disconnect", "host.shutdown"]);
    assert_eq!(h.coordinator.terminated().await, ShutdownReason::Requested);

    // The closed connection is not reopened by later triggers.
    let err = h.coordinator.on_trigger(&swap_trigger("later")).await.unwrap_err();
    assert_eq!(err, CoordinatorError::ShutDown);
    assert_eq!(h.sdk.connects(), 1);
}
