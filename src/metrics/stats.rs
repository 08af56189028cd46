//! Immutable statistics snapshots.

// Sample counts are far below 2^52
#![allow(clippy::cast_precision_loss)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sample::Unit;
use super::trend::TrendAnalysis;

/// Percentiles reported by every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    /// Median.
    pub p50: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// 99.9th percentile.
    pub p999: f64,
}

/// Statistics derived from a metric window at one point in time.
///
/// Never mutated after creation; a newer snapshot supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Samples in the window.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Order statistics.
    pub percentiles: Percentiles,
    /// Least-squares slope of value against time, in units per second.
    pub trend_slope: f64,
    /// `1 - coefficient of variation`, clamped to `[0, 1]`.
    pub stability_score: f64,
    /// Unit of the underlying stream.
    pub unit: Unit,
    /// When the snapshot was taken.
    pub computed_at: DateTime<Utc>,
}

impl StatisticsSnapshot {
    /// Compute a snapshot.
    ///
    /// `sorted` must hold the same values as `points`, ascending.
    /// Returns `None` when there are no values.
    #[must_use]
    pub fn compute(sorted: &[f64], points: &[(DateTime<Utc>, f64)], unit: Unit) -> Option<Self> {
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();

        Some(Self {
            count: sorted.len(),
            mean,
            stddev,
            min,
            max,
            percentiles: Percentiles {
                p50: percentile(sorted, 50.0),
                p90: percentile(sorted, 90.0),
                p95: percentile(sorted, 95.0),
                p99: percentile(sorted, 99.0),
                p999: percentile(sorted, 99.9),
            },
            trend_slope: least_squares_slope(points),
            stability_score: stability_score(mean, stddev),
            unit,
            computed_at: Utc::now(),
        })
    }

    /// Trend classification of this snapshot.
    #[must_use]
    pub fn trend(&self) -> TrendAnalysis {
        TrendAnalysis::from_slope(self.trend_slope, self.stddev.powi(2))
    }
}

/// Linear-interpolated percentile of an ascending slice.
#[must_use]
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let lo = rank.floor() as usize;
            let hi = (lo + 1).min(len - 1);
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Slope of value against seconds, or `0.0` when time does not vary.
#[must_use]
pub fn least_squares_slope(points: &[(DateTime<Utc>, f64)]) -> f64 {
    let Some(&(origin, _)) = points.first() else {
        return 0.0;
    };
    let xs: Vec<f64> = points
        .iter()
        .map(|(at, _)| {
            (*at - origin)
                .num_microseconds()
                .map_or(0.0, |us| us as f64 / 1_000_000.0)
        })
        .collect();
    let n = points.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut num, mut den) = (0.0, 0.0);
    for (x, (_, y)) in xs.iter().zip(points) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }
    if den.abs() < f64::EPSILON {
        0.0
    } else {
        num / den
    }
}

/// `1 - stddev/|mean|`, clamped to `[0, 1]`.
///
/// A zero mean is perfectly stable only if there is no spread at all.
#[must_use]
pub fn stability_score(mean: f64, stddev: f64) -> f64 {
    if mean.abs() < f64::EPSILON {
        return if stddev < f64::EPSILON { 1.0 } else { 0.0 };
    }
    (1.0 - stddev / mean.abs()).clamp(0.0, 1.0)
}
