//! Error types for Correcaminos

use thiserror::Error;

/// Errors that can occur while tracking steps
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Step count went backwards: {current} -> {requested}")]
    StepCountRegression { current: u64, requested: u64 },

    #[error("Step count {requested} exceeds the maximum of {max}")]
    StepCountOutOfRange { requested: u64, max: u64 },

    #[error("Invalid tracker state: {0}")]
    InvalidState(String),

    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Invalid goal input: {0:?}")]
    InvalidGoalInput(String),

    #[error("Failed to parse step reading: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to open link: {0}")]
    LinkError(String),

    #[error("Tracker controller is no longer running")]
    ControllerClosed,
}
