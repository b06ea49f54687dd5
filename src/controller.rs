//! TrackerController - actor that owns the ProgressTracker
//!
//! All mutations arrive as commands on one mpsc channel and are applied in
//! arrival order by a single task. Sensor readings use the same channel, so
//! a reading and a button press can never interleave inside an update.
//! Changes are published on a broadcast channel. The deferred gauge reset is
//! a deadline owned by the actor loop; it dies with the loop.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::events::TrackerEvent;
use crate::source::{SensorReading, StepSource};
use crate::tracker::ProgressTracker;
use crate::types::{HistoryEntry, ProgressSnapshot, StepOutcome};

/// Commands processed by the controller actor
#[derive(Debug)]
enum TrackerCommand {
    TakeStep {
        reply: oneshot::Sender<StepOutcome>,
    },
    Sensor {
        reading: SensorReading,
    },
    SetStepGoal {
        goal: i64,
        reply: oneshot::Sender<Result<u64, TrackerError>>,
    },
    SetStepGoalInput {
        input: String,
        reply: oneshot::Sender<Result<u64, TrackerError>>,
    },
    SetCalorieGoal {
        goal: f64,
        reply: oneshot::Sender<Result<f64, TrackerError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ProgressSnapshot>,
    },
    History {
        reply: oneshot::Sender<Vec<HistoryEntry>>,
    },
    Shutdown {
        reply: oneshot::Sender<ProgressSnapshot>,
    },
}

/// The actor: owns the tracker and the pending reset deadline
pub struct TrackerController {
    tracker: ProgressTracker,
    rx: mpsc::Receiver<TrackerCommand>,
    event_tx: broadcast::Sender<TrackerEvent>,
    reset_at: Option<Instant>,
}

impl TrackerController {
    /// Spawn a controller on the current tokio runtime and return its handle
    pub fn spawn(config: &TrackerConfig) -> TrackerHandle {
        let (tx, rx) = mpsc::channel(config.command_capacity);
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        let controller = Self {
            tracker: ProgressTracker::new(config),
            rx,
            event_tx: event_tx.clone(),
            reset_at: None,
        };
        info!(session_id = %controller.tracker.session_id(), "Tracker controller spawned");
        tokio::spawn(controller.run());

        TrackerHandle { tx, event_tx }
    }

    async fn run(mut self) {
        debug!("TrackerController::run: started");
        let mut shutdown_reply = None;

        loop {
            let reset_at = self.reset_at;
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(TrackerCommand::Shutdown { reply }) => {
                            debug!("TrackerController::run: shutdown requested");
                            shutdown_reply = Some(reply);
                            break;
                        }
                        Some(command) => self.handle(command),
                        None => {
                            debug!("TrackerController::run: all handles dropped");
                            break;
                        }
                    }
                }
                _ = time::sleep_until(reset_at.unwrap_or_else(Instant::now)), if reset_at.is_some() => {
                    self.reset_at = None;
                    let cleared_steps = self.tracker.reset_gauge();
                    self.emit(TrackerEvent::GaugeReset { cleared_steps });
                }
            }
            self.schedule_reset_if_due();
        }

        let discarded_reset = self.reset_at.take().is_some();
        self.tracker.cancel_pending_reset();
        if discarded_reset {
            debug!("TrackerController::run: discarded pending gauge reset");
        }
        self.emit(TrackerEvent::Stopped { discarded_reset });
        info!(session_id = %self.tracker.session_id(), "Tracker controller stopped");

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(self.tracker.snapshot());
        }
    }

    fn handle(&mut self, command: TrackerCommand) {
        match command {
            TrackerCommand::TakeStep { reply } => {
                let outcome = self.tracker.take_step();
                self.publish_outcome(&outcome);
                let _ = reply.send(outcome);
            }

            TrackerCommand::Sensor { reading } => match self.tracker.apply_reading(&reading) {
                Ok(outcome) => {
                    if !outcome.is_noop() {
                        self.publish_outcome(&outcome);
                    }
                }
                Err(dropped) => {
                    self.emit(TrackerEvent::ReadingDropped {
                        reason: dropped.to_string(),
                    });
                }
            },

            TrackerCommand::SetStepGoal { goal, reply } => {
                let result = self.tracker.set_step_goal(goal);
                self.publish_goals(&result);
                let _ = reply.send(result);
            }

            TrackerCommand::SetStepGoalInput { input, reply } => {
                let result = self.tracker.set_step_goal_from_input(&input);
                self.publish_goals(&result);
                let _ = reply.send(result);
            }

            TrackerCommand::SetCalorieGoal { goal, reply } => {
                let result = self.tracker.set_calorie_goal(goal);
                self.publish_goals(&result);
                let _ = reply.send(result);
            }

            TrackerCommand::Snapshot { reply } => {
                let _ = reply.send(self.tracker.snapshot());
            }

            TrackerCommand::History { reply } => {
                let _ = reply.send(self.tracker.history());
            }

            // Handled by the run loop
            TrackerCommand::Shutdown { .. } => {}
        }
    }

    fn schedule_reset_if_due(&mut self) {
        if !self.tracker.schedule_reset_if_due() {
            return;
        }
        let delay = self.tracker.reset_delay();
        self.reset_at = Some(Instant::now() + delay);

        let state = self.tracker.state();
        self.emit(TrackerEvent::GoalReached {
            step_count: state.step_count(),
            daily_step_goal: state.daily_step_goal(),
            reset_in_ms: delay.as_millis() as u64,
        });
    }

    fn publish_outcome(&self, outcome: &StepOutcome) {
        let state = self.tracker.state();
        self.emit(TrackerEvent::StepsUpdated {
            step_count: state.step_count(),
            total_steps: state.total_steps(),
            calorie_count: state.calorie_count(),
        });
        if outcome.points_awarded > 0 {
            self.emit(TrackerEvent::PointsAwarded {
                awarded: outcome.points_awarded,
                user_points: state.user_points(),
            });
        }
        for &steps in &outcome.milestones_recorded {
            self.emit(TrackerEvent::MilestoneRecorded { steps });
        }
    }

    fn publish_goals<T>(&self, result: &Result<T, TrackerError>) {
        if result.is_ok() {
            let goals = self.tracker.state().goals();
            self.emit(TrackerEvent::GoalsChanged {
                daily_step_goal: goals.daily_step_goal,
                daily_calorie_goal: goals.daily_calorie_goal,
            });
        }
    }

    fn emit(&self, event: TrackerEvent) {
        debug!(event_type = event.event_type(), "TrackerController::emit");
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

/// Handle to send commands to the TrackerController
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<TrackerCommand>,
    event_tx: broadcast::Sender<TrackerEvent>,
}

impl TrackerHandle {
    /// Subscribe to tracker events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_tx.subscribe()
    }

    /// Whether the controller has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Take one manual step
    pub async fn take_step(&self) -> Result<StepOutcome, TrackerError> {
        self.request(|reply| TrackerCommand::TakeStep { reply }).await
    }

    /// Set the daily step goal
    pub async fn set_step_goal(&self, goal: i64) -> Result<u64, TrackerError> {
        self.request(|reply| TrackerCommand::SetStepGoal { goal, reply })
            .await?
    }

    /// Set the daily step goal from text input
    pub async fn set_step_goal_from_input(&self, input: &str) -> Result<u64, TrackerError> {
        let input = input.to_string();
        self.request(|reply| TrackerCommand::SetStepGoalInput { input, reply })
            .await?
    }

    /// Set the daily calorie goal
    pub async fn set_calorie_goal(&self, goal: f64) -> Result<f64, TrackerError> {
        self.request(|reply| TrackerCommand::SetCalorieGoal { goal, reply })
            .await?
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> Result<ProgressSnapshot, TrackerError> {
        self.request(|reply| TrackerCommand::Snapshot { reply }).await
    }

    /// Rendered milestone history
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, TrackerError> {
        self.request(|reply| TrackerCommand::History { reply }).await
    }

    /// Stop the controller, discarding any pending reset.
    ///
    /// Returns the final snapshot.
    pub async fn shutdown(&self) -> Result<ProgressSnapshot, TrackerError> {
        self.request(|reply| TrackerCommand::Shutdown { reply }).await
    }

    /// Feed for step sources
    pub fn sensor_feed(&self) -> SensorFeed {
        SensorFeed {
            tx: self.tx.clone(),
        }
    }

    /// Start a step source.
    ///
    /// A source that is not available never starts; that is logged and
    /// published, not returned as an error.
    pub fn start_counting(&self, source: Box<dyn StepSource>) -> Option<JoinHandle<()>> {
        let name = source.name().to_string();
        if !source.is_available() {
            info!(source = %name, "Step counting not available, not starting");
            let _ = self
                .event_tx
                .send(TrackerEvent::SensorUnavailable { source: name });
            return None;
        }

        info!(source = %name, "Step counting started");
        let _ = self
            .event_tx
            .send(TrackerEvent::CountingStarted { source: name });
        Some(source.start(self.sensor_feed()))
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> TrackerCommand,
    ) -> Result<T, TrackerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| TrackerError::ControllerClosed)?;
        reply_rx.await.map_err(|_| TrackerError::ControllerClosed)
    }
}

/// Sender half used by step sources
#[derive(Clone)]
pub struct SensorFeed {
    tx: mpsc::Sender<TrackerCommand>,
}

impl SensorFeed {
    /// Deliver a reading, waiting for channel capacity
    pub async fn send(&self, reading: SensorReading) -> Result<(), TrackerError> {
        self.tx
            .send(TrackerCommand::Sensor { reading })
            .await
            .map_err(|_| TrackerError::ControllerClosed)
    }

    /// Callback-style delivery for sources outside the runtime.
    ///
    /// Never blocks: when the channel is full or closed the reading is
    /// dropped.
    pub fn on_step_count_update(&self, count: Option<u64>, error: Option<String>) {
        let reading = SensorReading {
            steps: count,
            error,
            observed_at: chrono::Utc::now(),
        };
        if let Err(e) = self.tx.try_send(TrackerCommand::Sensor { reading }) {
            warn!(error = %e, "SensorFeed: dropping reading");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScriptedSource;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn config_with_goal(goal: u64) -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.goals.daily_step_goal = goal;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_day_scenario() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        for _ in 0..5000 {
            handle.take_step().await.unwrap();
        }

        let at_goal = handle.snapshot().await.unwrap();
        assert_eq!(at_goal.step_count, 5000);
        assert_eq!(at_goal.gauge.ratio, 1.0);
        assert!(at_goal.reset_pending);

        time::sleep(Duration::from_millis(1100)).await;

        let after = handle.snapshot().await.unwrap();
        assert_eq!(after.step_count, 0);
        assert!((after.calorie_count - 200.0).abs() < 1e-9);
        assert_eq!(after.user_points, 100);
        let expected: Vec<u64> = (1..=500).map(|k| k * 10).collect();
        assert_eq!(after.step_history, expected);
        assert!(!after.reset_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_waits_for_delay() {
        let handle = TrackerController::spawn(&config_with_goal(20));
        for _ in 0..20 {
            handle.take_step().await.unwrap();
        }

        time::sleep(Duration::from_millis(999)).await;
        assert_eq!(handle.snapshot().await.unwrap().step_count, 20);

        time::sleep(Duration::from_millis(2)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.step_count, 0);
        assert_eq!(snapshot.user_points, 0);
        assert_eq!(snapshot.step_history, vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_goal_edit_mid_run() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        for _ in 0..50 {
            handle.take_step().await.unwrap();
        }
        handle.set_step_goal(100).await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.gauge.ratio, 0.5);
        assert_eq!(snapshot.daily_step_goal, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_goal_rejected() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        let result = handle.set_step_goal_from_input("lots").await;
        assert!(matches!(result, Err(TrackerError::InvalidGoalInput(_))));
        assert!(handle.set_step_goal(-5).await.is_err());
        assert_eq!(handle.snapshot().await.unwrap().daily_step_goal, 5000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_reset() {
        let handle = TrackerController::spawn(&config_with_goal(10));
        let mut events = handle.subscribe();
        for _ in 0..10 {
            handle.take_step().await.unwrap();
        }

        let last = handle.shutdown().await.unwrap();
        assert_eq!(last.step_count, 10);
        assert!(!last.reset_pending);

        time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_closed());
        assert!(matches!(
            handle.snapshot().await,
            Err(TrackerError::ControllerClosed)
        ));

        let mut saw_reset = false;
        let mut stopped = None;
        while let Ok(event) = events.try_recv() {
            match event {
                TrackerEvent::GaugeReset { .. } => saw_reset = true,
                TrackerEvent::Stopped { discarded_reset } => stopped = Some(discarded_reset),
                _ => {}
            }
        }
        assert!(!saw_reset);
        assert_eq!(stopped, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_for_milestone_and_points() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        let mut events = handle.subscribe();
        for _ in 0..50 {
            handle.take_step().await.unwrap();
        }
        handle.snapshot().await.unwrap();

        let mut milestones = Vec::new();
        let mut points = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                TrackerEvent::MilestoneRecorded { steps } => milestones.push(steps),
                TrackerEvent::PointsAwarded { user_points, .. } => points = user_points,
                _ => {}
            }
        }
        assert_eq!(milestones, vec![10, 20, 30, 40, 50]);
        assert_eq!(points, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_sensor_feed() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        let source = ScriptedSource::new(
            vec![
                SensorReading::count(12),
                SensorReading::failed("sensor glitch"),
                SensorReading::count(60),
            ],
            Duration::from_millis(100),
        );

        let task = handle.start_counting(Box::new(source)).unwrap();
        task.await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.step_count, 60);
        assert_eq!(snapshot.user_points, 1);
        assert_eq!(snapshot.step_history, vec![10, 20, 30, 40, 50, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_sensor_never_starts() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        let mut events = handle.subscribe();

        let started = handle.start_counting(Box::new(ScriptedSource::unavailable()));
        assert!(started.is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            TrackerEvent::SensorUnavailable {
                source: "scripted".to_string()
            }
        );
        assert_eq!(handle.snapshot().await.unwrap().step_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_reasons_are_published() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        let mut events = handle.subscribe();
        let feed = handle.sensor_feed();
        feed.send(SensorReading::count(40)).await.unwrap();
        feed.send(SensorReading::count(30)).await.unwrap();
        feed.send(SensorReading::failed("busy")).await.unwrap();
        handle.snapshot().await.unwrap();

        let reasons: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|event| match event {
                TrackerEvent::ReadingDropped { reason } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                "reading went backwards: 30 < 40".to_string(),
                "sensor error: busy".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_reading_keeps_controller_alive() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        handle.take_step().await.unwrap();
        let feed = handle.sensor_feed();
        feed.send(SensorReading::count(u64::MAX)).await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.step_count, 1);
        assert!(!handle.is_closed());

        feed.send(SensorReading::count(9)).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().step_count, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_feed() {
        let handle = TrackerController::spawn(&TrackerConfig::default());
        let feed = handle.sensor_feed();
        feed.on_step_count_update(Some(10), None);
        feed.on_step_count_update(None, Some("no data".to_string()));
        feed.on_step_count_update(Some(25), None);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.step_count, 25);
        assert_eq!(snapshot.step_history, vec![10, 20]);
    }
}
