//! Tracker events
//!
//! The controller publishes one event per observable change on a tokio
//! broadcast channel. Renderers subscribe and redraw from the events or
//! from a fresh snapshot.

use serde::{Deserialize, Serialize};

/// Observable tracker change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// Step counting started on a source
    CountingStarted { source: String },
    /// The step source cannot count on this device
    SensorUnavailable { source: String },
    /// A sensor reading was dropped
    ReadingDropped { reason: String },
    /// The step counter moved
    StepsUpdated {
        step_count: u64,
        total_steps: u64,
        calorie_count: f64,
    },
    /// Points were awarded
    PointsAwarded { awarded: u64, user_points: u64 },
    /// A milestone was appended to history
    MilestoneRecorded { steps: u64 },
    /// The step counter reached the goal; a reset follows after the delay
    GoalReached {
        step_count: u64,
        daily_step_goal: u64,
        reset_in_ms: u64,
    },
    /// The gauge counter returned to zero
    GaugeReset { cleared_steps: u64 },
    /// Goals were edited
    GoalsChanged {
        daily_step_goal: u64,
        daily_calorie_goal: f64,
    },
    /// The controller stopped
    Stopped { discarded_reset: bool },
}

impl TrackerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TrackerEvent::CountingStarted { .. } => "counting_started",
            TrackerEvent::SensorUnavailable { .. } => "sensor_unavailable",
            TrackerEvent::ReadingDropped { .. } => "reading_dropped",
            TrackerEvent::StepsUpdated { .. } => "steps_updated",
            TrackerEvent::PointsAwarded { .. } => "points_awarded",
            TrackerEvent::MilestoneRecorded { .. } => "milestone_recorded",
            TrackerEvent::GoalReached { .. } => "goal_reached",
            TrackerEvent::GaugeReset { .. } => "gauge_reset",
            TrackerEvent::GoalsChanged { .. } => "goals_changed",
            TrackerEvent::Stopped { .. } => "stopped",
        }
    }
}
