//! Trend classification and metric polarity.

use serde::{Deserialize, Serialize};

/// Slopes with a smaller magnitude are reported as stable.
pub const STABLE_SLOPE: f64 = 0.01;

/// Direction of a metric over its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Rising.
    Increasing,
    /// Falling.
    Decreasing,
    /// Flat within [`STABLE_SLOPE`].
    Stable,
}

/// Classified trend of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Direction.
    pub direction: TrendDirection,
    /// Raw slope in units per second.
    pub slope: f64,
    /// `min(1, |slope| / (variance + 0.001))`.
    pub confidence: f64,
}

impl TrendAnalysis {
    /// Classify a slope given the window's variance.
    #[must_use]
    pub fn from_slope(slope: f64, variance: f64) -> Self {
        let direction = if slope.abs() < STABLE_SLOPE {
            TrendDirection::Stable
        } else if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        Self {
            direction,
            slope,
            confidence: (slope.abs() / (variance + 0.001)).min(1.0),
        }
    }
}

/// Which direction of change counts as a degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPolarity {
    /// Latency, loss and resource usage: growth is bad.
    HigherIsWorse,
    /// Rates and throughput: a drop is bad.
    LowerIsWorse,
    /// Counters and totals: growth is expected, never a regression.
    Neutral,
}

impl MetricPolarity {
    /// Infer polarity from a metric name.
    #[must_use]
    pub fn for_metric(metric_name: &str) -> Self {
        let name = metric_name.to_lowercase();
        if name.contains("count") || name.contains("total") || name.ends_with("processes") {
            Self::Neutral
        } else if (name.contains("rate") && !name.contains("loss"))
            || name.contains("throughput")
            || name.contains("available")
        {
            Self::LowerIsWorse
        } else {
            Self::HigherIsWorse
        }
    }

    /// Signed degradation of `current` relative to `reference`, as a fraction.
    ///
    /// Positive values are degradations. `None` when the reference is zero
    /// or the metric is neutral.
    #[must_use]
    pub fn degradation(self, current: f64, reference: f64) -> Option<f64> {
        if self == Self::Neutral || reference.abs() < f64::EPSILON {
            return None;
        }
        let delta = (current - reference) / reference.abs();
        Some(match self {
            Self::HigherIsWorse => delta,
            Self::LowerIsWorse | Self::Neutral => -delta,
        })
    }
}
