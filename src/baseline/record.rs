//! Finalized baseline records, quality grading and comparison.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BaselineError;
use crate::metrics::{MetricPolarity, StatisticsSnapshot};

use super::idle::IdleValidationResult;

/// Mean CPU above which a baseline is flagged.
pub const HIGH_CPU_WARNING_PCT: f64 = 20.0;

/// Mean memory above which a baseline is flagged.
pub const HIGH_MEMORY_WARNING_PCT: f64 = 70.0;

/// Floor applied to the baseline mean when computing a relative delta.
const DELTA_FLOOR: f64 = 0.1;

/// Coarse quality grade of a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineQuality {
    /// Unstable, short or sparse.
    Poor,
    /// Usable with caution.
    Fair,
    /// Stable over at least a minute.
    Good,
    /// Stable over at least three minutes with dense sampling.
    Excellent,
}

impl BaselineQuality {
    /// Grade from quality score, capture duration and sample count.
    #[must_use]
    pub fn grade(score: f64, duration_secs: f64, sample_count: usize) -> Self {
        if score >= 0.9 && duration_secs >= 180.0 && sample_count >= 90 {
            Self::Excellent
        } else if score >= 0.8 && duration_secs >= 60.0 && sample_count >= 30 {
            Self::Good
        } else if score >= 0.6 && duration_secs >= 30.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for BaselineQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        };
        f.write_str(s)
    }
}

/// A finalized baseline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// Unique identifier.
    pub id: String,
    /// When capture started.
    pub captured_at: DateTime<Utc>,
    /// Capture length in seconds.
    pub duration_secs: f64,
    /// Statistics per metric name, pooled across sources.
    pub metrics: BTreeMap<String, StatisticsSnapshot>,
    /// Outcome of the idle gate preceding capture.
    pub idle_validation: IdleValidationResult,
    /// Samples captured across all metrics.
    pub sample_count: usize,
    /// Mean stability score across metrics, in `[0, 1]`.
    pub quality_score: f64,
    /// Grade derived from score, duration and density.
    pub quality: BaselineQuality,
    /// Conditions consumers must surface alongside comparisons.
    pub warnings: Vec<String>,
}

/// Inputs to [`BaselineRecord::finalize`].
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    /// When capture started.
    pub captured_at: DateTime<Utc>,
    /// Capture length in seconds.
    pub duration_secs: f64,
    /// Statistics per metric name.
    pub metrics: BTreeMap<String, StatisticsSnapshot>,
    /// Samples captured.
    pub sample_count: usize,
    /// Idle gate outcome.
    pub idle_validation: IdleValidationResult,
}

/// Result of comparing a snapshot against the active baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    /// Baseline compared against.
    pub baseline_id: String,
    /// Metric name.
    pub metric: String,
    /// Baseline mean.
    pub baseline_mean: f64,
    /// Current mean.
    pub current_mean: f64,
    /// Signed change relative to the baseline, in percent.
    pub delta_pct: f64,
    /// `|delta_pct|` within the configured tolerance.
    pub within_tolerance: bool,
    /// The change goes in the good direction for this metric.
    pub improved: bool,
    /// Grade of the baseline used.
    pub baseline_quality: BaselineQuality,
    /// Whether the baseline carries warnings.
    pub baseline_has_warnings: bool,
}

impl BaselineRecord {
    /// Build a record from a completed capture.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::Rejected`] if nothing was captured.
    pub fn finalize(
        summary: CaptureSummary,
        quality_threshold: f64,
        min_samples: usize,
    ) -> Result<Self, BaselineError> {
        if summary.sample_count == 0 || summary.metrics.is_empty() {
            return Err(BaselineError::Rejected {
                reason: "no samples received during capture".into(),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let quality_score = summary
            .metrics
            .values()
            .map(|s| s.stability_score)
            .sum::<f64>()
            / summary.metrics.len() as f64;
        let quality_score = quality_score.clamp(0.0, 1.0);

        let mut warnings = Vec::new();
        if !summary.idle_validation.validated {
            warnings.push("System idle state was not validated before measurement".to_string());
        }
        if let Some(cpu) = summary.metrics.get("cpu_percent") {
            if cpu.mean > HIGH_CPU_WARNING_PCT {
                warnings.push(format!("High CPU usage during baseline: {:.1}%", cpu.mean));
            }
        }
        if let Some(memory) = summary.metrics.get("memory_percent") {
            if memory.mean > HIGH_MEMORY_WARNING_PCT {
                warnings.push(format!("High memory usage during baseline: {:.1}%", memory.mean));
            }
        }
        if quality_score < quality_threshold {
            warnings.push(format!("Low stability score: {quality_score:.3}"));
        }
        if summary.sample_count < min_samples {
            warnings.push(format!(
                "Insufficient data points: {} collected, {min_samples} recommended",
                summary.sample_count
            ));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            captured_at: summary.captured_at,
            duration_secs: summary.duration_secs,
            quality: BaselineQuality::grade(quality_score, summary.duration_secs, summary.sample_count),
            metrics: summary.metrics,
            idle_validation: summary.idle_validation,
            sample_count: summary.sample_count,
            quality_score,
            warnings,
        })
    }

    /// Statistics for one metric.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&StatisticsSnapshot> {
        self.metrics.get(name)
    }

    /// Time since capture started.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.captured_at
    }

    /// Compare `current` against this baseline's statistics for `metric`.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::MetricNotCaptured`] if the metric was not
    /// part of the capture.
    pub fn compare(
        &self,
        current: &StatisticsSnapshot,
        metric: &str,
        tolerance_pct: f64,
    ) -> Result<BaselineComparison, BaselineError> {
        let reference = self.metric(metric).ok_or_else(|| BaselineError::MetricNotCaptured {
            metric: metric.to_string(),
            baseline_id: self.id.clone(),
        })?;

        let delta_pct =
            (current.mean - reference.mean) / reference.mean.abs().max(DELTA_FLOOR) * 100.0;
        let improved = MetricPolarity::for_metric(metric)
            .degradation(current.mean, reference.mean)
            .is_some_and(|d| d < 0.0);

        Ok(BaselineComparison {
            baseline_id: self.id.clone(),
            metric: metric.to_string(),
            baseline_mean: reference.mean,
            current_mean: current.mean,
            delta_pct,
            within_tolerance: delta_pct.abs() <= tolerance_pct,
            improved,
            baseline_quality: self.quality,
            baseline_has_warnings: !self.warnings.is_empty(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::Unit;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn snapshot(values: &[f64]) -> StatisticsSnapshot {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let start = Utc::now();
        let points: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + chrono::Duration::seconds(i as i64), *v))
            .collect();
        StatisticsSnapshot::compute(&sorted, &points, Unit::Percent).unwrap()
    }

    fn summary(metrics: BTreeMap<String, StatisticsSnapshot>, samples: usize, validated: bool) -> CaptureSummary {
        CaptureSummary {
            captured_at: Utc::now(),
            duration_secs: 300.0,
            metrics,
            sample_count: samples,
            idle_validation: if validated {
                IdleValidationResult::passed_for_testing()
            } else {
                IdleValidationResult::skipped()
            },
        }
    }

    #[test_case(0.95, 200.0, 100, BaselineQuality::Excellent)]
    #[test_case(0.95, 100.0, 100, BaselineQuality::Good)]
    #[test_case(0.85, 60.0, 30, BaselineQuality::Good)]
    #[test_case(0.85, 60.0, 29, BaselineQuality::Fair)]
    #[test_case(0.65, 30.0, 5, BaselineQuality::Fair)]
    #[test_case(0.65, 29.0, 500, BaselineQuality::Poor)]
    #[test_case(0.5, 600.0, 500, BaselineQuality::Poor)]
    fn test_quality_grade(score: f64, duration: f64, samples: usize, expected: BaselineQuality) {
        assert_eq!(BaselineQuality::grade(score, duration, samples), expected);
    }

    #[test]
    fn test_finalize_rejects_empty_capture() {
        let err = BaselineRecord::finalize(summary(BTreeMap::new(), 0, true), 0.8, 30).unwrap_err();
        assert!(matches!(err, BaselineError::Rejected { .. }));
    }

    #[test]
    fn test_finalize_stable_capture_has_no_warnings() {
        let mut metrics = BTreeMap::new();
        metrics.insert("cpu_percent".to_string(), snapshot(&[10.0; 60]));
        let record = BaselineRecord::finalize(summary(metrics, 60, true), 0.8, 30).unwrap();
        assert!((record.quality_score - 1.0).abs() < 1e-9);
        assert!(record.warnings.is_empty(), "{:?}", record.warnings);
    }

    #[test]
    fn test_finalize_low_quality_warns_but_succeeds() {
        let mut metrics = BTreeMap::new();
        metrics.insert("cpu_percent".to_string(), snapshot(&[2.0, 48.0, 2.0, 48.0]));
        metrics.insert("memory_percent".to_string(), snapshot(&[75.0, 75.0]));
        let record = BaselineRecord::finalize(summary(metrics, 6, false), 0.8, 30).unwrap();

        assert_eq!(record.quality, BaselineQuality::Poor);
        let text = record.warnings.join("\n");
        assert!(text.contains("not validated"));
        assert!(text.contains("High CPU usage during baseline: 25.0%"));
        assert!(text.contains("High memory usage during baseline: 75.0%"));
        assert!(text.contains("Low stability score"));
        assert!(text.contains("Insufficient data points"));
    }

    #[test]
    fn test_compare_within_and_outside_tolerance() {
        let mut metrics = BTreeMap::new();
        metrics.insert("latency_ms".to_string(), snapshot(&[10.0; 40]));
        let record = BaselineRecord::finalize(summary(metrics, 40, true), 0.8, 30).unwrap();

        let near = record.compare(&snapshot(&[11.0; 5]), "latency_ms", 20.0).unwrap();
        assert!((near.delta_pct - 10.0).abs() < 1e-9);
        assert!(near.within_tolerance);
        assert!(!near.improved);

        let far = record.compare(&snapshot(&[15.0; 5]), "latency_ms", 20.0).unwrap();
        assert!(!far.within_tolerance);

        let better = record.compare(&snapshot(&[5.0; 5]), "latency_ms", 20.0).unwrap();
        assert!(better.improved);
        assert!(!better.within_tolerance);
    }

    #[test]
    fn test_compare_rate_polarity() {
        let mut metrics = BTreeMap::new();
        metrics.insert("average_rate".to_string(), snapshot(&[100.0; 40]));
        let record = BaselineRecord::finalize(summary(metrics, 40, true), 0.8, 30).unwrap();
        let faster = record.compare(&snapshot(&[120.0; 5]), "average_rate", 20.0).unwrap();
        assert!(faster.improved);
    }

    #[test]
    fn test_compare_unknown_metric() {
        let mut metrics = BTreeMap::new();
        metrics.insert("cpu_percent".to_string(), snapshot(&[10.0; 40]));
        let record = BaselineRecord::finalize(summary(metrics, 40, true), 0.8, 30).unwrap();
        let err = record.compare(&snapshot(&[1.0]), "loss_rate", 20.0).unwrap_err();
        assert!(matches!(err, BaselineError::MetricNotCaptured { .. }));
    }

    #[test]
    fn test_json_roundtrip_preserves_comparison() {
        let mut metrics = BTreeMap::new();
        metrics.insert("latency_ms".to_string(), snapshot(&[3.3, 4.7, 5.1, 3.9, 4.25]));
        let record = BaselineRecord::finalize(summary(metrics, 5, true), 0.8, 30).unwrap();
        let current = snapshot(&[4.1, 6.3, 5.9]);

        let json = serde_json::to_string(&record).unwrap();
        let reloaded: BaselineRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, record);
        assert_eq!(
            reloaded.compare(&current, "latency_ms", 20.0).unwrap(),
            record.compare(&current, "latency_ms", 20.0).unwrap()
        );
    }
}
