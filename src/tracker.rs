//! Synchronous tracker
//!
//! `ProgressTracker` owns one `ProgressState` together with the bookkeeping
//! the state itself does not carry: the last accepted sensor reading, the
//! reset-pending flag and the session identity. The async controller wraps
//! it; the C FFI uses it directly and leaves the reset timer to the host.

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::gauge::ProgressGauge;
use crate::goals::GoalEditor;
use crate::history::HistoryLog;
use crate::source::SensorReading;
use crate::state::ProgressState;
use crate::types::{
    DroppedReading, HistoryEntry, ProgressSnapshot, StepOutcome, ThresholdRule,
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Stateful step tracker
pub struct ProgressTracker {
    state: ProgressState,
    rule: ThresholdRule,
    reset_delay: Duration,
    /// Last cumulative count accepted from the sensor
    last_sensor_count: Option<u64>,
    reset_pending: bool,
    session_id: Uuid,
    updated_at: DateTime<Utc>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

impl ProgressTracker {
    /// Create a tracker from configuration
    pub fn new(config: &TrackerConfig) -> Self {
        let session_id = Uuid::new_v4();
        debug!(%session_id, rule = config.threshold_rule.as_str(), "ProgressTracker::new");
        Self {
            state: ProgressState::new(config.goals),
            rule: config.threshold_rule,
            reset_delay: config.reset_delay(),
            last_sensor_count: None,
            reset_pending: false,
            session_id,
            updated_at: Utc::now(),
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn reset_delay(&self) -> Duration {
        self.reset_delay
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Take one manual step
    pub fn take_step(&mut self) -> StepOutcome {
        let outcome = self.state.take_step(self.rule);
        self.touch();
        outcome
    }

    /// Move the gauge counter to an absolute value
    pub fn apply_step_count(&mut self, new_count: u64) -> Result<StepOutcome, TrackerError> {
        let outcome = self.state.apply_step_count(new_count, self.rule)?;
        self.touch();
        Ok(outcome)
    }

    /// Apply a sensor callback.
    ///
    /// The sensor reports cumulative steps since counting started. The
    /// difference to the last accepted reading is added to the gauge counter,
    /// so manual steps and gauge resets combine with the feed. Readings that
    /// carry an error, have no count, go backwards or push the counter out of
    /// range are dropped; the error says why.
    pub fn on_step_count_update(
        &mut self,
        count: Option<u64>,
        error: Option<&str>,
    ) -> Result<StepOutcome, DroppedReading> {
        if let Some(error) = error {
            debug!(error, "on_step_count_update: dropping reading with error");
            return Err(DroppedReading::SensorError(error.to_string()));
        }
        let Some(count) = count else {
            debug!("on_step_count_update: dropping reading without data");
            return Err(DroppedReading::NoData);
        };

        let baseline = self.last_sensor_count.unwrap_or(0);
        if count < baseline {
            debug!(count, baseline, "on_step_count_update: dropping regressed reading");
            return Err(DroppedReading::Regressed { count, baseline });
        }

        let Some(target) = self.state.step_count().checked_add(count - baseline) else {
            debug!(count, baseline, "on_step_count_update: step count overflow");
            return Err(DroppedReading::OutOfRange { count });
        };
        let outcome = self.apply_step_count(target).map_err(|e| {
            debug!(count, error = %e, "on_step_count_update: dropping reading");
            DroppedReading::OutOfRange { count }
        })?;
        self.last_sensor_count = Some(count);
        Ok(outcome)
    }

    /// Apply a reading delivered by a step source
    pub fn apply_reading(
        &mut self,
        reading: &SensorReading,
    ) -> Result<StepOutcome, DroppedReading> {
        self.on_step_count_update(reading.steps, reading.error.as_deref())
    }

    /// Set the daily step goal
    pub fn set_step_goal(&mut self, value: i64) -> Result<u64, TrackerError> {
        let goal = GoalEditor::set_step_goal(&mut self.state, value)?;
        self.touch();
        Ok(goal)
    }

    /// Set the daily step goal from text input
    pub fn set_step_goal_from_input(&mut self, input: &str) -> Result<u64, TrackerError> {
        let goal = GoalEditor::set_step_goal_from_input(&mut self.state, input)?;
        self.touch();
        Ok(goal)
    }

    /// Set the daily calorie goal
    pub fn set_calorie_goal(&mut self, value: f64) -> Result<f64, TrackerError> {
        let goal = GoalEditor::set_calorie_goal(&mut self.state, value)?;
        self.touch();
        Ok(goal)
    }

    pub fn goal_reached(&self) -> bool {
        ProgressGauge::goal_reached(self.state.step_count(), self.state.daily_step_goal())
    }

    /// Mark a gauge reset as pending if the goal is reached and none is
    /// pending yet. Returns true when the caller must schedule the reset.
    pub fn schedule_reset_if_due(&mut self) -> bool {
        if self.reset_pending || !self.goal_reached() {
            return false;
        }
        self.reset_pending = true;
        info!(
            step_count = self.state.step_count(),
            goal = self.state.daily_step_goal(),
            delay_ms = self.reset_delay.as_millis() as u64,
            "Daily step goal reached, gauge reset scheduled"
        );
        true
    }

    /// Return the gauge counter to zero. Returns the steps cleared.
    pub fn reset_gauge(&mut self) -> u64 {
        self.reset_pending = false;
        let cleared = self.state.reset_gauge();
        self.touch();
        info!(cleared, "Gauge reset");
        cleared
    }

    /// Drop a pending reset without applying it
    pub fn cancel_pending_reset(&mut self) -> bool {
        std::mem::replace(&mut self.reset_pending, false)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        let step_count = self.state.step_count();
        let goal = self.state.daily_step_goal();
        ProgressSnapshot {
            session_id: self.session_id,
            step_count,
            calorie_count: self.state.calorie_count(),
            total_steps: self.state.total_steps(),
            daily_step_goal: goal,
            daily_calorie_goal: self.state.daily_calorie_goal(),
            step_history: self.state.step_history().to_vec(),
            user_points: self.state.user_points(),
            gauge: ProgressGauge::read(step_count, goal),
            goal_reached: ProgressGauge::goal_reached(step_count, goal),
            reset_pending: self.reset_pending,
            updated_at: self.updated_at,
        }
    }

    /// Rendered milestone history
    pub fn history(&self) -> Vec<HistoryEntry> {
        HistoryLog::entries(self.state.step_history())
    }

    /// Snapshot as JSON
    pub fn snapshot_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
