//! End-to-end tests over the public API

use std::time::Duration;

use correcaminos::{
    HistoryLog, ProgressState, ProgressTracker, ScriptedSource, SensorReading, ThresholdRule,
    TrackerConfig, TrackerController, TrackerError, TrackerEvent,
};
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn sensor_walk_reaches_goal_and_resets() {
    let mut config = TrackerConfig::default();
    config.goals.daily_step_goal = 100;
    let handle = TrackerController::spawn(&config);
    let mut events = handle.subscribe();

    let source = ScriptedSource::walking(120, 7, Duration::from_millis(200));
    let task = handle.start_counting(Box::new(source)).unwrap();
    task.await.unwrap();

    // Every reading lands before the reset fires
    let before = handle.snapshot().await.unwrap();
    assert!(before.step_count >= 100);
    assert!(before.goal_reached);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let after = handle.snapshot().await.unwrap();
    assert_eq!(after.total_steps, 120);
    assert!((after.calorie_count - 4.8).abs() < 1e-9);
    assert_eq!(after.user_points, 2);
    assert_eq!(after.step_history.len(), 12);

    let mut goal_reached = 0;
    let mut resets = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            TrackerEvent::GoalReached { reset_in_ms, .. } => {
                assert_eq!(reset_in_ms, 1000);
                goal_reached += 1;
            }
            TrackerEvent::GaugeReset { .. } => resets += 1,
            _ => {}
        }
    }
    assert_eq!(goal_reached, 1);
    assert_eq!(resets, 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn manual_steps_and_sensor_share_one_counter() {
    let handle = TrackerController::spawn(&TrackerConfig::default());
    for _ in 0..5 {
        handle.take_step().await.unwrap();
    }
    let feed = handle.sensor_feed();
    feed.send(SensorReading::count(20)).await.unwrap();
    feed.send(SensorReading::count(15)).await.unwrap();
    feed.send(SensorReading::count(30)).await.unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.step_count, 35);
    assert_eq!(snapshot.step_history, vec![10, 20, 30]);

    handle.shutdown().await.unwrap();
    assert!(matches!(
        handle.take_step().await,
        Err(TrackerError::ControllerClosed)
    ));
}

#[test]
fn landing_only_rule_skips_jumped_thresholds() {
    let mut config = TrackerConfig::default();
    config.threshold_rule = ThresholdRule::LandingOnly;
    let mut tracker = ProgressTracker::new(&config);

    tracker.apply_step_count(45).unwrap();
    tracker.apply_step_count(100).unwrap();
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.user_points, 1);
    assert_eq!(snapshot.step_history, vec![100]);
}

#[test]
fn state_survives_json_and_renders_history() {
    let mut tracker = ProgressTracker::default();
    for _ in 0..60 {
        tracker.take_step();
    }

    let json = tracker.state().to_json().unwrap();
    let restored = ProgressState::from_json(&json).unwrap();
    assert_eq!(&restored, tracker.state());

    let text = HistoryLog::render_text(restored.step_history(), restored.user_points());
    assert!(text.starts_with("Points: 1"));
    assert_eq!(text.lines().count(), 7);
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"goals": {"daily_step_goal": 8000}, "reset_delay_ms": 250}"#)
        .unwrap();

    let config = TrackerConfig::from_file(&path).unwrap();
    assert_eq!(config.goals.daily_step_goal, 8000);
    assert_eq!(config.reset_delay(), Duration::from_millis(250));
    assert_eq!(config.threshold_rule, ThresholdRule::Crossing);
}

#[test]
fn restored_state_rejects_tampered_history() {
    let mut tracker = ProgressTracker::default();
    for _ in 0..20 {
        tracker.take_step();
    }
    let json = tracker.state().to_json().unwrap();
    let tampered = json.replace("[10,20]", "[10,10]");
    assert_ne!(json, tampered);
    assert!(ProgressState::from_json(&tampered).is_err());
}
