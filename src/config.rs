//! Tracker configuration
//!
//! Configuration is plain JSON. Every field has a default, so an empty
//! object (or no file at all) yields the stock tracker.

use crate::error::TrackerError;
use crate::goals::GoalEditor;
use crate::link::INFO_URL;
use crate::types::{GoalConfig, ThresholdRule};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default delay before the gauge resets after the goal is reached
pub const DEFAULT_RESET_DELAY_MS: u64 = 1000;

/// Default capacity of the controller command channel
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Default capacity of the tracker event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Initial daily goals
    pub goals: GoalConfig,
    /// Delay between reaching the goal and the gauge reset (milliseconds)
    pub reset_delay_ms: u64,
    /// How step thresholds are detected on multi-step updates
    pub threshold_rule: ThresholdRule,
    /// Page opened by the info action
    pub info_url: String,
    /// Controller command channel capacity
    pub command_capacity: usize,
    /// Event broadcast channel capacity
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            goals: GoalConfig::default(),
            reset_delay_ms: DEFAULT_RESET_DELAY_MS,
            threshold_rule: ThresholdRule::default(),
            info_url: INFO_URL.to_string(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl TrackerConfig {
    /// Parse and validate configuration JSON
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self, TrackerError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check goals and channel sizes
    pub fn validate(&self) -> Result<(), TrackerError> {
        let step_goal = i64::try_from(self.goals.daily_step_goal).map_err(|_| {
            TrackerError::ConfigError(format!(
                "daily_step_goal out of range: {}",
                self.goals.daily_step_goal
            ))
        })?;
        GoalEditor::validate_step_goal(step_goal)?;
        GoalEditor::validate_calorie_goal(self.goals.daily_calorie_goal)?;

        if self.command_capacity == 0 {
            return Err(TrackerError::ConfigError(
                "command_capacity must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(TrackerError::ConfigError(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if self.info_url.trim().is_empty() {
            return Err(TrackerError::ConfigError("info_url is empty".to_string()));
        }
        Ok(())
    }

    /// Gauge reset delay
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}
