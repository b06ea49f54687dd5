//! Goal editing
//!
//! Goal values come from user input. Zero and negative goals are rejected
//! so the gauge ratio stays defined; a rejected edit keeps the prior goal.

use crate::error::TrackerError;
use crate::state::ProgressState;
use tracing::{debug, info};

/// Validates and applies goal edits
pub struct GoalEditor;

impl GoalEditor {
    /// Validate a step goal entered as an integer
    pub fn validate_step_goal(value: i64) -> Result<u64, TrackerError> {
        if value <= 0 {
            return Err(TrackerError::InvalidGoal(format!(
                "daily step goal must be positive, got {}",
                value
            )));
        }
        Ok(value as u64)
    }

    /// Parse a step goal from text input
    pub fn parse_step_goal(input: &str) -> Result<u64, TrackerError> {
        let value: i64 = input
            .trim()
            .parse()
            .map_err(|_| TrackerError::InvalidGoalInput(input.to_string()))?;
        Self::validate_step_goal(value)
    }

    /// Validate a calorie goal
    pub fn validate_calorie_goal(value: f64) -> Result<f64, TrackerError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(TrackerError::InvalidGoal(format!(
                "daily calorie goal must be a positive number, got {}",
                value
            )));
        }
        Ok(value)
    }

    /// Set the daily step goal
    pub fn set_step_goal(state: &mut ProgressState, value: i64) -> Result<u64, TrackerError> {
        let goal = Self::validate_step_goal(value).inspect_err(|e| {
            debug!(value, error = %e, "set_step_goal: rejected");
        })?;
        state.set_daily_step_goal(goal);
        info!(daily_step_goal = goal, "Daily step goal updated");
        Ok(goal)
    }

    /// Set the daily step goal from text input
    pub fn set_step_goal_from_input(
        state: &mut ProgressState,
        input: &str,
    ) -> Result<u64, TrackerError> {
        let goal = Self::parse_step_goal(input).inspect_err(|e| {
            debug!(input, error = %e, "set_step_goal_from_input: rejected");
        })?;
        state.set_daily_step_goal(goal);
        info!(daily_step_goal = goal, "Daily step goal updated");
        Ok(goal)
    }

    /// Set the daily calorie goal
    pub fn set_calorie_goal(state: &mut ProgressState, value: f64) -> Result<f64, TrackerError> {
        let goal = Self::validate_calorie_goal(value)?;
        state.set_daily_calorie_goal(goal);
        info!(daily_calorie_goal = goal, "Daily calorie goal updated");
        Ok(goal)
    }
}
