//! Progress gauge
//!
//! Maps the step counter and daily goal onto the circular gauge:
//! - ratio clamped to 0-1
//! - displayed percentage rounded to the nearest integer
//! - goal detection, which drives the deferred gauge reset

use crate::types::GaugeReading;

/// Pure gauge computations
pub struct ProgressGauge;

impl ProgressGauge {
    /// Progress ratio `min(step_count / goal, 1.0)`.
    ///
    /// A zero goal reads as complete.
    pub fn ratio(step_count: u64, daily_step_goal: u64) -> f64 {
        if daily_step_goal == 0 {
            return 1.0;
        }
        (step_count as f64 / daily_step_goal as f64).min(1.0)
    }

    /// Displayed percentage for a ratio
    pub fn percent(ratio: f64) -> u8 {
        (ratio.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// Full gauge reading
    pub fn read(step_count: u64, daily_step_goal: u64) -> GaugeReading {
        let ratio = Self::ratio(step_count, daily_step_goal);
        GaugeReading {
            ratio,
            percent: Self::percent(ratio),
        }
    }

    /// Whether the step counter has reached the goal
    pub fn goal_reached(step_count: u64, daily_step_goal: u64) -> bool {
        step_count >= daily_step_goal
    }
}
