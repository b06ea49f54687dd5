//! Correcaminos - On-device step tracking core
//!
//! Correcaminos turns step counts (from a motion sensor feed or manual taps)
//! into calories, reward points, a milestone history and progress toward a
//! daily step goal:
//! step source → accumulation rule → history / gauge → snapshot.
//!
//! ## Modules
//!
//! - **State**: the accumulation rule over steps, calories, points and history
//! - **Gauge**: goal progress and the deferred reset when the goal is reached
//! - **Controller**: single-owner async actor fed by step sources and user commands

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gauge;
pub mod goals;
pub mod history;
pub mod link;
pub mod source;
pub mod state;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::TrackerConfig;
pub use controller::{SensorFeed, TrackerController, TrackerHandle};
pub use error::TrackerError;
pub use events::TrackerEvent;
pub use gauge::ProgressGauge;
pub use goals::GoalEditor;
pub use history::HistoryLog;
pub use source::{NdjsonSource, ScriptedSource, SensorReading, StepSource};
pub use state::ProgressState;
pub use tracker::ProgressTracker;
pub use types::{
    DroppedReading, GoalConfig, HistoryEntry, ProgressSnapshot, StepOutcome, ThresholdRule,
};

/// Correcaminos version
pub const TRACKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and FFI
pub const PRODUCER_NAME: &str = "correcaminos";
