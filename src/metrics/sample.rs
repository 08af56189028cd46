//! The normalized metric sample shared by every stage of the pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit of a normalized sample value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Percentage in `[0, 100]`.
    Percent,
    /// Megabytes.
    Megabytes,
    /// Milliseconds.
    Milliseconds,
    /// Events per second.
    Hertz,
    /// Dimensionless count.
    Count,
    /// Bytes.
    Bytes,
    /// Fraction in `[0, 1]`.
    Ratio,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Percent => "%",
            Self::Megabytes => "MB",
            Self::Milliseconds => "ms",
            Self::Hertz => "Hz",
            Self::Count => "count",
            Self::Bytes => "B",
            Self::Ratio => "ratio",
        };
        f.write_str(s)
    }
}

/// Identity of one metric stream: a metric reported by one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    /// Reporting component.
    pub source_id: String,
    /// Metric name.
    pub metric_name: String,
}

impl StreamKey {
    /// Create a stream key.
    #[must_use]
    pub fn new(source_id: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            metric_name: metric_name.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.metric_name)
    }
}

/// A single normalized measurement.
///
/// `(source_id, metric_name, sequence)` is unique within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Reporting component.
    pub source_id: String,
    /// Metric name.
    pub metric_name: String,
    /// Measured value.
    pub value: f64,
    /// Unit of `value`.
    pub unit: Unit,
    /// When the value was measured.
    pub timestamp: DateTime<Utc>,
    /// Per-source sequence number of the report that carried this value.
    pub sequence: u64,
}

impl MetricSample {
    /// Create a sample stamped with the current time.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        metric_name: impl Into<String>,
        value: f64,
        unit: Unit,
        sequence: u64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            metric_name: metric_name.into(),
            value,
            unit,
            timestamp: Utc::now(),
            sequence,
        }
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The stream this sample belongs to.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(&self.source_id, &self.metric_name)
    }
}
