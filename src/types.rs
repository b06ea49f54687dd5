//! Core types for the Correcaminos tracker
//!
//! This module defines the values that flow between the accumulation rule,
//! the gauge, the history log and the snapshot handed to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kilocalories burned per step
pub const CALORIES_PER_STEP: f64 = 0.04;

/// Step interval at which a milestone is recorded in history
pub const MILESTONE_INTERVAL: u64 = 10;

/// Step interval at which one reward point is awarded
pub const POINTS_INTERVAL: u64 = 50;

/// Largest gauge step count the tracker accepts
pub const MAX_STEP_COUNT: u64 = 10_000_000;

/// Default daily step goal
pub const DEFAULT_DAILY_STEP_GOAL: u64 = 5000;

/// Default daily calorie goal (kcal)
pub const DEFAULT_DAILY_CALORIE_GOAL: f64 = 2000.0;

/// How step thresholds (milestones and points) are detected on an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdRule {
    /// Every threshold between the previous and the new count is credited
    #[default]
    Crossing,
    /// Only the count landed on is checked
    LandingOnly,
}

impl ThresholdRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdRule::Crossing => "crossing",
            ThresholdRule::LandingOnly => "landing_only",
        }
    }
}

/// User-editable daily goals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalConfig {
    /// Steps to reach for a full gauge
    pub daily_step_goal: u64,
    /// Calorie target (kcal); kept in state, not used by the gauge
    pub daily_calorie_goal: f64,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            daily_step_goal: DEFAULT_DAILY_STEP_GOAL,
            daily_calorie_goal: DEFAULT_DAILY_CALORIE_GOAL,
        }
    }
}

/// Result of applying one step count update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step count before the update
    pub previous_count: u64,
    /// Step count after the update
    pub step_count: u64,
    /// Points awarded by this update
    pub points_awarded: u64,
    /// Milestones appended to history by this update
    pub milestones_recorded: Vec<u64>,
}

impl StepOutcome {
    /// Steps added by this update
    pub fn steps_added(&self) -> u64 {
        self.step_count - self.previous_count
    }

    pub fn is_noop(&self) -> bool {
        self.step_count == self.previous_count
    }
}

/// Why a sensor reading was not applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DroppedReading {
    #[error("sensor error: {0}")]
    SensorError(String),

    #[error("reading without a step count")]
    NoData,

    #[error("reading went backwards: {count} < {baseline}")]
    Regressed { count: u64, baseline: u64 },

    #[error("reading {count} moves the step count out of range")]
    OutOfRange { count: u64 },
}

/// Gauge position derived from step count and goal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaugeReading {
    /// Progress ratio, clamped to 0-1
    pub ratio: f64,
    /// Displayed percentage (0-100)
    pub percent: u8,
}

/// One rendered row of the milestone history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Step count at the milestone
    pub steps: u64,
    /// Calories burned at that step count (kcal)
    pub calories_burned: f64,
    /// Points the milestone step count is worth
    pub points_at_milestone: u64,
}

/// Read-only view of the tracker handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Tracking session identifier (new on every start)
    pub session_id: Uuid,
    /// Gauge-driving step counter
    pub step_count: u64,
    /// Calories burned (kcal)
    pub calorie_count: f64,
    /// Steps accrued across gauge resets
    pub total_steps: u64,
    /// Current daily step goal
    pub daily_step_goal: u64,
    /// Current daily calorie goal (kcal)
    pub daily_calorie_goal: f64,
    /// Recorded milestones, in order of first occurrence
    pub step_history: Vec<u64>,
    /// Reward points
    pub user_points: u64,
    /// Gauge position
    pub gauge: GaugeReading,
    /// Step count has reached the daily goal
    pub goal_reached: bool,
    /// A gauge reset is scheduled but has not fired yet
    pub reset_pending: bool,
    /// Time of the last state change
    pub updated_at: DateTime<Utc>,
}
