//! Shutdown timer behaviour under paused tokio time
//!
//! Default timeouts: ServiceTimeout 180 s, EmptyDelay 60 s.
//!
//! Run with: cargo test --test integration_shutdown_timers

mod common;

use common::{pay_info_trigger, settle, swap_succeeded, swap_trigger, HarnessBuilder};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use walletnotify_core::{SchedulerState, ShutdownReason, TriggerMessage};

fn assert_elapsed(start: Instant, secs: u64) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
        "expected shutdown at {}s, got {:?}",
        secs,
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_delay_after_last_job_completes() {
    let h = HarnessBuilder::new().build();
    let start = Instant::now();

    h.coordinator.on_trigger(&swap_trigger("swap-a")).await.unwrap();
    sleep(Duration::from_secs(10)).await;
    h.session.emit(swap_succeeded("swap-a"));

    let reason = h.coordinator.terminated().await;

    assert_eq!(reason, ShutdownReason::EmptyDelay);
    assert_elapsed(start, 70);
    assert_eq!(h.bridge.titles(), vec!["Payment succeeded".to_string()]);
    assert_eq!(h.bridge.shutdowns.lock().as_slice(), &[ShutdownReason::EmptyDelay]);
}

#[tokio::test(start_paused = true)]
async fn test_service_timeout_rearmed_by_later_trigger() {
    let h = HarnessBuilder::new().build();
    let start = Instant::now();

    h.coordinator.on_trigger(&swap_trigger("never-0")).await.unwrap();
    sleep(Duration::from_secs(50)).await;
    h.coordinator.on_trigger(&swap_trigger("never-50")).await.unwrap();

    let reason = h.coordinator.terminated().await;

    assert_eq!(reason, ShutdownReason::ServiceTimeout);
    assert_elapsed(start, 230);
    // Both stuck jobs were told to wind down.
    assert_eq!(
        h.bridge.titles(),
        vec!["Swap still pending".to_string(), "Swap still pending".to_string()]
    );
    assert_eq!(
        h.coordinator.scheduler_state(),
        SchedulerState::Fired(ShutdownReason::ServiceTimeout)
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_trigger_cancels_pending_empty_delay() {
    let h = HarnessBuilder::new().build();
    let start = Instant::now();

    h.coordinator.on_trigger(&swap_trigger("swap-a")).await.unwrap();
    sleep(Duration::from_secs(5)).await;
    h.session.emit(swap_succeeded("swap-a"));

    sleep(Duration::from_secs(25)).await;
    assert!(!h.coordinator.is_shut_down());
    h.coordinator.on_trigger(&swap_trigger("swap-b")).await.unwrap();

    sleep(Duration::from_secs(10)).await;
    h.session.emit(swap_succeeded("swap-b"));

    let reason = h.coordinator.terminated().await;

    assert_eq!(reason, ShutdownReason::EmptyDelay);
    assert_elapsed(start, 100);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_job_keeps_service_alive_until_service_timeout() {
    let h = HarnessBuilder::new().build();
    let start = Instant::now();

    h.coordinator.on_trigger(&pay_info_trigger()).await.unwrap();
    h.coordinator.on_trigger(&swap_trigger("stuck")).await.unwrap();
    settle().await;

    // The pay info job finished right away; the swap job is still waiting.
    assert_eq!(h.coordinator.active_jobs().len(), 1);

    let reason = h.coordinator.terminated().await;

    assert_eq!(reason, ShutdownReason::ServiceTimeout);
    assert_elapsed(start, 180);
    assert_eq!(h.bridge.titles(), vec!["Swap still pending".to_string()]);
    assert_eq!(h.bridge.replies.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_trigger_alone_ends_after_empty_delay() {
    let h = HarnessBuilder::new().build();
    let start = Instant::now();

    let result = h
        .coordinator
        .on_trigger(&TriggerMessage::new("lnurlpay_verify", serde_json::json!({})))
        .await;
    assert!(result.is_err());

    let reason = h.coordinator.terminated().await;

    assert_eq!(reason, ShutdownReason::EmptyDelay);
    assert_elapsed(start, 60);
    assert_eq!(h.sdk.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeouts_are_honoured() {
    let h = HarnessBuilder::new().timeouts(30_000, 5_000).build();
    let start = Instant::now();

    h.coordinator.on_trigger(&pay_info_trigger()).await.unwrap();

    let reason = h.coordinator.terminated().await;

    assert_eq!(reason, ShutdownReason::EmptyDelay);
    assert_elapsed(start, 5);
}

#[tokio::test(start_paused = true)]
async fn test_host_shutdown_cancels_timers() {
    let h = HarnessBuilder::new().build();

    h.coordinator.on_trigger(&swap_trigger("pending")).await.unwrap();
    settle().await;
    h.coordinator.shutdown().await;

    assert_eq!(h.coordinator.terminated().await, ShutdownReason::Requested);

    // Well past both deadlines: nothing else fires.
    sleep(Duration::from_secs(600)).await;
    assert_eq!(h.bridge.shutdowns.lock().as_slice(), &[ShutdownReason::Requested]);
    assert_eq!(h.coordinator.scheduler_state(), SchedulerState::Cancelled);
    assert_eq!(h.bridge.titles(), vec!["Swap still pending".to_string()]);
}
