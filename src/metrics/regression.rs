//! Sustained regression detection.
//!
//! Each evaluation compares a stream's current mean and p95 against the
//! average of its trailing reference evaluations. A regression is reported
//! only while the degradation has exceeded the threshold for `sustain`
//! consecutive evaluations, so one noisy snapshot never alerts.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::StatisticsConfig;

use super::sample::StreamKey;
use super::stats::StatisticsSnapshot;
use super::trend::MetricPolarity;

/// Counts consecutive evaluations above a fractional threshold.
#[derive(Debug, Clone)]
pub struct SustainGate {
    threshold: f64,
    sustain: u32,
    consecutive: u32,
}

impl SustainGate {
    /// Create a gate. `threshold` is a fraction (`0.2` for 20%).
    #[must_use]
    pub const fn new(threshold: f64, sustain: u32) -> Self {
        Self {
            threshold,
            sustain,
            consecutive: 0,
        }
    }

    /// Feed one evaluation; returns whether the sustained condition holds.
    pub fn observe(&mut self, degradation: f64) -> bool {
        if degradation > self.threshold {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.consecutive = 0;
        }
        self.consecutive >= self.sustain
    }

    /// Current run of exceeding evaluations.
    #[must_use]
    pub const fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// A sustained degradation of one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSignal {
    /// Affected stream.
    pub key: StreamKey,
    /// Degradation as a fraction of the reference.
    pub degradation: f64,
    /// Consecutive exceeding evaluations.
    pub consecutive: u32,
    /// Current mean.
    pub current_mean: f64,
    /// Reference mean.
    pub reference_mean: f64,
    /// Current p95.
    pub current_p95: f64,
    /// Reference p95.
    pub reference_p95: f64,
}

#[derive(Debug)]
struct StreamState {
    reference: VecDeque<(f64, f64)>,
    gate: SustainGate,
}

/// Per-stream regression detector.
///
/// Owned by a single evaluation loop; not shared.
#[derive(Debug)]
pub struct RegressionDetector {
    threshold: f64,
    sustain: u32,
    reference_size: usize,
    streams: HashMap<StreamKey, StreamState>,
}

impl RegressionDetector {
    /// Create a detector. `threshold_pct` is a percentage.
    #[must_use]
    pub fn new(threshold_pct: f64, sustain: u32, reference_size: usize) -> Self {
        Self {
            threshold: threshold_pct / 100.0,
            sustain: sustain.max(1),
            reference_size: reference_size.max(1),
            streams: HashMap::new(),
        }
    }

    /// Create a detector from configuration.
    #[must_use]
    pub fn from_config(config: &StatisticsConfig) -> Self {
        Self::new(
            config.regression_threshold_pct,
            config.regression_sustain,
            config.regression_reference_size,
        )
    }

    /// Evaluate a fresh snapshot of `key`.
    pub fn evaluate(
        &mut self,
        key: &StreamKey,
        snapshot: &StatisticsSnapshot,
    ) -> Option<RegressionSignal> {
        let polarity = MetricPolarity::for_metric(&key.metric_name);
        let (threshold, sustain, reference_size) =
            (self.threshold, self.sustain, self.reference_size);
        let state = self
            .streams
            .entry(key.clone())
            .or_insert_with(|| StreamState {
                reference: VecDeque::with_capacity(reference_size),
                gate: SustainGate::new(threshold, sustain),
            });

        let current = (snapshot.mean, snapshot.percentiles.p95);
        let mut degraded = false;
        let signal = if state.reference.is_empty() {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = state.reference.len() as f64;
            let ref_mean = state.reference.iter().map(|r| r.0).sum::<f64>() / n;
            let ref_p95 = state.reference.iter().map(|r| r.1).sum::<f64>() / n;

            let degradation = [
                polarity.degradation(current.0, ref_mean),
                polarity.degradation(current.1, ref_p95),
            ]
            .into_iter()
            .flatten()
            .reduce(f64::max);

            degradation.and_then(|degradation| {
                degraded = degradation > threshold;
                state.gate.observe(degradation).then(|| RegressionSignal {
                    key: key.clone(),
                    degradation,
                    consecutive: state.gate.consecutive(),
                    current_mean: current.0,
                    reference_mean: ref_mean,
                    current_p95: current.1,
                    reference_p95: ref_p95,
                })
            })
        };

        // A degraded evaluation stays out of the reference so a step change
        // keeps being measured against the level it departed from.
        if !degraded {
            state.reference.push_back(current);
        }
        while state.reference.len() > reference_size {
            state.reference.pop_front();
        }

        if let Some(signal) = &signal {
            tracing::debug!(
                stream = %signal.key,
                degradation = signal.degradation,
                consecutive = signal.consecutive,
                "Sustained regression detected"
            );
        }
        signal
    }

    /// Forget all stream state.
    pub fn reset(&mut self) {
        self.streams.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::sample::Unit;
    use crate::metrics::stats::Percentiles;
    use chrono::Utc;
    use test_case::test_case;

    fn snapshot(value: f64) -> StatisticsSnapshot {
        StatisticsSnapshot {
            count: 10,
            mean: value,
            stddev: 0.0,
            min: value,
            max: value,
            percentiles: Percentiles {
                p50: value,
                p90: value,
                p95: value,
                p99: value,
                p999: value,
            },
            trend_slope: 0.0,
            stability_score: 1.0,
            unit: Unit::Milliseconds,
            computed_at: Utc::now(),
        }
    }

    #[test_case(&[0.25, 0.05, 0.30], false ; "interrupted run does not alert")]
    #[test_case(&[0.25, 0.22, 0.30], true ; "three consecutive alerts")]
    #[test_case(&[0.25, 0.22], false ; "two is not enough")]
    #[test_case(&[0.20, 0.20, 0.20], false ; "threshold is exclusive")]
    fn test_sustain_gate(degradations: &[f64], expect_alert: bool) {
        let mut gate = SustainGate::new(0.20, 3);
        let last = degradations.iter().map(|d| gate.observe(*d)).last().unwrap();
        assert_eq!(last, expect_alert);
    }

    #[test]
    fn test_sustain_gate_never_alerts_early() {
        let mut gate = SustainGate::new(0.20, 3);
        assert!(!gate.observe(0.25));
        assert!(!gate.observe(0.22));
        assert!(gate.observe(0.30));
        assert!(gate.observe(0.31));
        assert!(!gate.observe(0.0));
    }

    #[test]
    fn test_single_spike_never_regresses() {
        let mut detector = RegressionDetector::new(20.0, 3, 1);
        let key = StreamKey::new("sub-1", "latency_ms");
        assert!(detector.evaluate(&key, &snapshot(10.0)).is_none());
        assert!(detector.evaluate(&key, &snapshot(100.0)).is_none());
        assert!(detector.evaluate(&key, &snapshot(10.0)).is_none());
        assert!(detector.evaluate(&key, &snapshot(10.0)).is_none());
    }

    #[test]
    fn test_detector_alerts_on_sustained_plateau() {
        let mut detector = RegressionDetector::new(20.0, 3, 10);
        let key = StreamKey::new("sub-1", "latency_ms");
        for _ in 0..10 {
            assert!(detector.evaluate(&key, &snapshot(100.0)).is_none());
        }

        let alerts: Vec<bool> = (0..10)
            .map(|_| detector.evaluate(&key, &snapshot(125.0)).is_some())
            .collect();
        assert_eq!(alerts, [false, false, true, true, true, true, true, true, true, true]);

        let signal = detector.evaluate(&key, &snapshot(125.0)).unwrap();
        assert_eq!(signal.consecutive, 13);
        assert!((signal.reference_mean - 100.0).abs() < 1e-9);
        assert!((signal.degradation - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_recovery_resumes_reference_tracking() {
        let mut detector = RegressionDetector::new(20.0, 2, 2);
        let key = StreamKey::new("sub-1", "latency_ms");
        detector.evaluate(&key, &snapshot(100.0));
        detector.evaluate(&key, &snapshot(130.0));
        assert!(detector.evaluate(&key, &snapshot(130.0)).is_some());

        // Back within threshold: the gate resets and the reference moves on.
        assert!(detector.evaluate(&key, &snapshot(110.0)).is_none());
        assert!(detector.evaluate(&key, &snapshot(115.0)).is_none());
        let signal = detector.evaluate(&key, &snapshot(150.0));
        assert!(signal.is_none());
        let signal = detector.evaluate(&key, &snapshot(150.0)).unwrap();
        assert!((signal.reference_mean - 112.5).abs() < 1e-9);
    }

    #[test]
    fn test_detector_uses_polarity_for_rates() {
        let mut detector = RegressionDetector::new(10.0, 1, 1);
        let key = StreamKey::new("pub-1", "average_rate");
        detector.evaluate(&key, &snapshot(1000.0));
        assert!(detector.evaluate(&key, &snapshot(1500.0)).is_none());
        assert!(detector.evaluate(&key, &snapshot(1000.0)).is_some());
    }

    #[test]
    fn test_neutral_counters_ignored() {
        let mut detector = RegressionDetector::new(10.0, 1, 1);
        let key = StreamKey::new("sub-1", "message_count");
        detector.evaluate(&key, &snapshot(10.0));
        assert!(detector.evaluate(&key, &snapshot(1000.0)).is_none());
    }
}
