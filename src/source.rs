//! Step sources
//!
//! A step source delivers cumulative step counts (or failures) to the
//! controller through a [`SensorFeed`]. How the counts are produced is the
//! source's business; the tracker only sees readings.
//!
//! Reading format (one JSON object per line for [`NdjsonSource`]):
//!
//! ```text
//! {"steps": 120, "observed_at": "2024-01-15T14:01:00Z"}
//! {"error": "motion sensor unavailable"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::controller::SensorFeed;
use crate::error::TrackerError;

/// One sensor callback: a cumulative count, an error, or neither
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Cumulative steps since counting started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u64>,
    /// Failure reported by the sensor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the reading was taken
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl SensorReading {
    /// A successful reading
    pub fn count(steps: u64) -> Self {
        Self {
            steps: Some(steps),
            error: None,
            observed_at: Utc::now(),
        }
    }

    /// A failed reading
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            steps: None,
            error: Some(error.into()),
            observed_at: Utc::now(),
        }
    }

    /// Parse one JSON reading
    pub fn parse_line(line: &str) -> Result<Self, TrackerError> {
        serde_json::from_str(line.trim())
            .map_err(|e| TrackerError::ParseError(format!("{}: {}", e, line.trim())))
    }

    /// Whether the tracker can use this reading
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && self.steps.is_some()
    }
}

/// Producer of step readings
pub trait StepSource: Send + 'static {
    /// Short name for logs and events
    fn name(&self) -> &str;

    /// Whether step counting is possible at all
    fn is_available(&self) -> bool {
        true
    }

    /// Start delivering readings into `feed`.
    ///
    /// The task ends when the source is exhausted or the controller stops.
    fn start(self: Box<Self>, feed: SensorFeed) -> JoinHandle<()>;
}

/// Replays a fixed list of readings at a fixed interval
pub struct ScriptedSource {
    readings: Vec<SensorReading>,
    interval: Duration,
    available: bool,
}

impl ScriptedSource {
    pub fn new(readings: Vec<SensorReading>, interval: Duration) -> Self {
        Self {
            readings,
            interval,
            available: true,
        }
    }

    /// Cumulative counts `step, 2*step, ...` up to `total`
    pub fn walking(total: u64, step: u64, interval: Duration) -> Self {
        let step = step.max(1);
        let mut counts: Vec<u64> = (1..=total / step).map(|n| n * step).collect();
        if total % step != 0 {
            counts.push(total);
        }
        Self::new(counts.into_iter().map(SensorReading::count).collect(), interval)
    }

    /// A source on a device without step counting
    pub fn unavailable() -> Self {
        Self {
            readings: Vec::new(),
            interval: Duration::ZERO,
            available: false,
        }
    }
}

impl StepSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn start(self: Box<Self>, feed: SensorFeed) -> JoinHandle<()> {
        let ScriptedSource {
            readings, interval, ..
        } = *self;
        tokio::spawn(async move {
            let total = readings.len();
            for (index, reading) in readings.into_iter().enumerate() {
                if feed.send(reading).await.is_err() {
                    debug!(index, "ScriptedSource: controller closed");
                    return;
                }
                if index + 1 < total && !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }
            debug!(total, "ScriptedSource: exhausted");
        })
    }
}

/// Reads newline-delimited JSON readings from an async reader
pub struct NdjsonSource<R> {
    reader: R,
    name: String,
}

impl<R> NdjsonSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
        }
    }
}

impl<R> StepSource for NdjsonSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(self: Box<Self>, feed: SensorFeed) -> JoinHandle<()> {
        let NdjsonSource { reader, name } = *self;
        let mut lines = reader.lines();
        tokio::spawn(async move {
            let mut delivered = 0usize;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        info!(source = %name, error = %e, "NdjsonSource: read failed, stopping");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                // Malformed lines become failed readings, which the tracker drops
                let reading = SensorReading::parse_line(&line)
                    .unwrap_or_else(|e| SensorReading::failed(e.to_string()));
                if feed.send(reading).await.is_err() {
                    debug!(source = %name, "NdjsonSource: controller closed");
                    return;
                }
                delivered += 1;
            }
            debug!(source = %name, delivered, "NdjsonSource: end of input");
        })
    }
}
