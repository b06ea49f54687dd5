//! Milestone history log
//!
//! Rows are derived from the recorded milestone step counts on every read;
//! nothing besides the step counts is stored.

use crate::types::{HistoryEntry, CALORIES_PER_STEP, POINTS_INTERVAL};
use std::fmt::Write;

impl HistoryEntry {
    /// Derive the row for one recorded milestone
    pub fn from_steps(steps: u64) -> Self {
        Self {
            steps,
            calories_burned: steps as f64 * CALORIES_PER_STEP,
            points_at_milestone: steps / POINTS_INTERVAL,
        }
    }

    /// Calories as whole kilocalories (truncated) for display
    pub fn whole_calories(&self) -> u64 {
        self.calories_burned as u64
    }
}

/// Derived view over recorded milestones
pub struct HistoryLog;

impl HistoryLog {
    /// Rows for every recorded milestone, in recording order
    pub fn entries(step_history: &[u64]) -> Vec<HistoryEntry> {
        step_history
            .iter()
            .map(|&steps| HistoryEntry::from_steps(steps))
            .collect()
    }

    /// Plain-text rendering: a points row followed by one line per milestone
    pub fn render_text(step_history: &[u64], user_points: u64) -> String {
        let mut out = String::new();
        let dots = "•".repeat(user_points as usize);
        let _ = writeln!(out, "Points: {} ({})", user_points, dots);

        if step_history.is_empty() {
            out.push_str("No milestones yet\n");
            return out;
        }

        for entry in Self::entries(step_history) {
            let _ = writeln!(
                out,
                "{:>6} kcal  {:>8} steps  {:>6} points",
                entry.whole_calories(),
                entry.steps,
                entry.points_at_milestone
            );
        }
        out
    }
}
