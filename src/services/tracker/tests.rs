//! Tests for the Tracker lifecycle

use super::*;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::{SimulatedGps, SimulatedRewardCentral, SimulatedTripPricer};
use crate::services::directory::UserDirectory;
use crate::services::internal_users::seed_internal_users;
use crate::services::rewards::RewardEngine;
use tokio::time::{timeout, Instant};

fn create_test_guide(user_count: usize, gps_latency_ms: u64) -> Arc<TourGuide> {
    let config = Config::default().without_simulated_latency();
    let metrics = Arc::new(Metrics::new());
    let directory = Arc::new(UserDirectory::new());
    seed_internal_users(&directory, user_count);

    let gps = Arc::new(SimulatedGps::new((gps_latency_ms, gps_latency_ms)));
    let oracle = Arc::new(SimulatedRewardCentral::new((0, 0)));
    let rewards = Arc::new(RewardEngine::new(&config, gps.clone(), oracle, metrics.clone()));
    let pricer = Arc::new(SimulatedTripPricer::new((0, 0)));
    Arc::new(TourGuide::new(&config, directory, gps, rewards, pricer, metrics))
}

fn create_test_tracker(user_count: usize) -> Tracker {
    Tracker::new(create_test_guide(user_count, 0), Duration::from_secs(300))
}

async fn wait_for_cycles(tracker: &Tracker, cycles: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while tracker.cycles_completed() < cycles {
        assert!(Instant::now() < deadline, "tracker did not complete {cycles} cycle(s)");
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_new_tracker_is_stopped() {
    let tracker = create_test_tracker(1);
    assert_eq!(tracker.state(), TrackerState::Stopped);
    assert!(tracker.last_cycle().is_none());
    assert_eq!(tracker.cycles_completed(), 0);
}

#[tokio::test]
async fn test_start_then_immediate_stop() {
    let tracker = create_test_tracker(10);
    tracker.start().unwrap();
    assert_eq!(tracker.state(), TrackerState::Running);

    timeout(Duration::from_secs(1), tracker.stop()).await.expect("stop should not hang");
    assert_eq!(tracker.state(), TrackerState::Stopped);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let tracker = create_test_tracker(1);
    tracker.start().unwrap();

    let err = tracker.start().unwrap_err();
    assert!(matches!(err, TourGuideError::AlreadyRunning));

    tracker.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let tracker = create_test_tracker(1);
    tracker.stop().await;

    tracker.start().unwrap();
    tracker.stop().await;
    tracker.stop().await;
    assert_eq!(tracker.state(), TrackerState::Stopped);
}

#[tokio::test]
async fn test_first_cycle_runs_immediately() {
    let guide = create_test_guide(5, 0);
    let tracker = Tracker::new(guide.clone(), Duration::from_secs(300));
    tracker.start().unwrap();

    wait_for_cycles(&tracker, 1).await;
    tracker.stop().await;

    // 3 seeded locations plus the tracked one
    for user in guide.all_users() {
        assert_eq!(user.visited_location_count(), 4);
    }
    let last = tracker.last_cycle().unwrap();
    assert_eq!(last.tracked, 5);
    assert!(last.failures.is_empty());
}

#[tokio::test]
async fn test_cycles_repeat_after_interval() {
    let guide = create_test_guide(2, 0);
    let tracker = Tracker::new(guide, Duration::from_millis(10));
    tracker.start().unwrap();

    wait_for_cycles(&tracker, 3).await;
    tracker.stop().await;
    assert!(tracker.cycles_completed() >= 3);
}

#[tokio::test]
async fn test_stop_interrupts_in_flight_cycle() {
    let guide = create_test_guide(3, 10_000);
    let tracker = Tracker::new(guide.clone(), Duration::from_secs(300));
    tracker.start().unwrap();
    sleep(Duration::from_millis(20)).await;

    timeout(Duration::from_secs(1), tracker.stop()).await.expect("stop should cancel the cycle");
    assert_eq!(tracker.cycles_completed(), 0);
    for user in guide.all_users() {
        assert_eq!(user.visited_location_count(), 3);
    }
}

#[tokio::test]
async fn test_restart_after_stop() {
    let tracker = create_test_tracker(2);
    tracker.start().unwrap();
    wait_for_cycles(&tracker, 1).await;
    tracker.stop().await;

    tracker.start().unwrap();
    wait_for_cycles(&tracker, 2).await;
    tracker.stop().await;
    assert_eq!(tracker.state(), TrackerState::Stopped);
}

#[tokio::test]
async fn test_status_serializes() {
    let tracker = create_test_tracker(1);
    tracker.start().unwrap();
    wait_for_cycles(&tracker, 1).await;

    let status = serde_json::to_value(tracker.status()).unwrap();
    assert_eq!(status["state"], "running");
    assert_eq!(status["cycles_completed"], 1);
    assert_eq!(status["last_cycle"]["tracked"], 1);

    tracker.stop().await;
}
