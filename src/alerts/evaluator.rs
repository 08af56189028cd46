//! Rule evaluation with per-(metric, rule) cooldown and a retention buffer.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::rule::{default_rules, AlertRule, RuleKind, Severity};
use crate::baseline::BaselineComparison;
use crate::config::AlertConfig;
use crate::metrics::{RegressionSignal, StatisticsSnapshot, StreamKey};

/// What an alert was measured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertReference {
    /// A fixed rule threshold.
    Threshold {
        /// Threshold value.
        value: f64,
    },
    /// The active baseline.
    Baseline {
        /// Baseline identifier.
        baseline_id: String,
        /// Baseline mean.
        baseline_mean: f64,
        /// Signed change in percent.
        delta_pct: f64,
        /// Tolerance that was exceeded.
        tolerance_pct: f64,
    },
    /// The trailing reference window.
    Trailing {
        /// Reference mean.
        reference_mean: f64,
        /// Degradation as a fraction.
        degradation: f64,
        /// Consecutive exceeding evaluations.
        consecutive: u32,
    },
}

/// A raised alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Severity.
    pub severity: Severity,
    /// Rule that fired.
    pub rule: String,
    /// Metric name.
    pub metric_name: String,
    /// Reporting component, when known.
    pub source_id: Option<String>,
    /// Observed value.
    pub observed_value: f64,
    /// Threshold or baseline the value was compared against.
    pub reference: AlertReference,
    /// Human-readable summary.
    pub message: String,
    /// When the alert was raised.
    pub timestamp: DateTime<Utc>,
}

/// Evaluation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    /// Alerts raised.
    pub raised: u64,
    /// Breaches swallowed by the cooldown.
    pub suppressed: u64,
}

/// Evaluates rules against snapshots, baseline comparisons and regressions.
///
/// Owned by the aggregation loop.
#[derive(Debug)]
pub struct AlertEvaluator {
    rules: Vec<AlertRule>,
    cooldown: Duration,
    retention: Duration,
    capacity: usize,
    last_fired: HashMap<(String, String), Instant>,
    recent: VecDeque<(Instant, Alert)>,
    stats: AlertStats,
}

impl AlertEvaluator {
    /// Create an evaluator with explicit rules.
    #[must_use]
    pub fn new(rules: Vec<AlertRule>, config: &AlertConfig) -> Self {
        Self {
            rules,
            cooldown: Duration::from_secs(config.cooldown_secs),
            retention: Duration::from_secs(config.retention_secs),
            capacity: config.retention_capacity.max(1),
            last_fired: HashMap::new(),
            recent: VecDeque::new(),
            stats: AlertStats::default(),
        }
    }

    /// Create an evaluator with [`default_rules`].
    #[must_use]
    pub fn with_default_rules(config: &AlertConfig, tolerance_pct: f64) -> Self {
        Self::new(default_rules(tolerance_pct), config)
    }

    /// Configured rules.
    #[must_use]
    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> AlertStats {
        self.stats
    }

    /// Check absolute rules against a fresh snapshot.
    pub fn evaluate_snapshot(&mut self, key: &StreamKey, snapshot: &StatisticsSnapshot) -> Vec<Alert> {
        let breaches: Vec<_> = self
            .rules
            .iter()
            .filter(|r| r.applies_to(&key.metric_name))
            .filter_map(|r| r.breached_by(snapshot.mean).map(|t| (r.clone(), t)))
            .collect();

        breaches
            .into_iter()
            .filter_map(|(rule, threshold)| {
                let direction = if matches!(rule.kind, RuleKind::Below { .. }) { "below" } else { "above" };
                let alert = Alert {
                    severity: rule.severity,
                    rule: rule.name.clone(),
                    metric_name: key.metric_name.clone(),
                    source_id: Some(key.source_id.clone()),
                    observed_value: snapshot.mean,
                    reference: AlertReference::Threshold { value: threshold },
                    message: format!(
                        "{key} mean {:.3} {direction} threshold {threshold}",
                        snapshot.mean
                    ),
                    timestamp: Utc::now(),
                };
                self.fire(alert)
            })
            .collect()
    }

    /// Check baseline-deviation rules against a comparison.
    ///
    /// Only degradations count; a change in the good direction never alerts.
    pub fn evaluate_comparison(
        &mut self,
        source_id: Option<&str>,
        comparison: &BaselineComparison,
    ) -> Vec<Alert> {
        if comparison.improved {
            return Vec::new();
        }
        let breaches: Vec<_> = self
            .rules
            .iter()
            .filter(|r| r.applies_to(&comparison.metric))
            .filter_map(|r| match r.kind {
                RuleKind::BaselineDeviation { tolerance_pct }
                    if comparison.delta_pct.abs() > tolerance_pct =>
                {
                    Some((r.clone(), tolerance_pct))
                }
                _ => None,
            })
            .collect();

        breaches
            .into_iter()
            .filter_map(|(rule, tolerance_pct)| {
                let alert = Alert {
                    severity: rule.severity,
                    rule: rule.name.clone(),
                    metric_name: comparison.metric.clone(),
                    source_id: source_id.map(ToString::to_string),
                    observed_value: comparison.current_mean,
                    reference: AlertReference::Baseline {
                        baseline_id: comparison.baseline_id.clone(),
                        baseline_mean: comparison.baseline_mean,
                        delta_pct: comparison.delta_pct,
                        tolerance_pct,
                    },
                    message: format!(
                        "{} deviates {:+.1}% from baseline {} (tolerance {tolerance_pct}%)",
                        comparison.metric, comparison.delta_pct, comparison.baseline_id
                    ),
                    timestamp: Utc::now(),
                };
                self.fire(alert)
            })
            .collect()
    }

    /// Turn a sustained regression signal into alerts.
    pub fn evaluate_regression(&mut self, signal: &RegressionSignal) -> Vec<Alert> {
        let rules: Vec<_> = self
            .rules
            .iter()
            .filter(|r| r.kind == RuleKind::Regression && r.applies_to(&signal.key.metric_name))
            .cloned()
            .collect();

        rules
            .into_iter()
            .filter_map(|rule| {
                let alert = Alert {
                    severity: rule.severity,
                    rule: rule.name.clone(),
                    metric_name: signal.key.metric_name.clone(),
                    source_id: Some(signal.key.source_id.clone()),
                    observed_value: signal.current_mean,
                    reference: AlertReference::Trailing {
                        reference_mean: signal.reference_mean,
                        degradation: signal.degradation,
                        consecutive: signal.consecutive,
                    },
                    message: format!(
                        "{} regressed {:.1}% over {} evaluations",
                        signal.key,
                        signal.degradation * 100.0,
                        signal.consecutive
                    ),
                    timestamp: Utc::now(),
                };
                self.fire(alert)
            })
            .collect()
    }

    /// Alerts raised within the retention horizon, oldest first.
    pub fn active(&mut self) -> Vec<Alert> {
        self.prune();
        self.recent.iter().map(|(_, a)| a.clone()).collect()
    }

    /// Forget cooldowns and retained alerts.
    pub fn reset(&mut self) {
        self.last_fired.clear();
        self.recent.clear();
    }

    fn fire(&mut self, alert: Alert) -> Option<Alert> {
        let now = Instant::now();
        let key = (alert.metric_name.clone(), alert.rule.clone());
        if let Some(last) = self.last_fired.get(&key) {
            if now.duration_since(*last) < self.cooldown {
                self.stats.suppressed += 1;
                debug!(metric = %key.0, rule = %key.1, "Alert suppressed by cooldown");
                return None;
            }
        }
        self.last_fired.insert(key, now);
        self.stats.raised += 1;

        match alert.severity {
            Severity::Info => info!(rule = %alert.rule, "{}", alert.message),
            _ => warn!(rule = %alert.rule, severity = %alert.severity, "{}", alert.message),
        }

        self.recent.push_back((now, alert.clone()));
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
        self.prune();
        Some(alert)
    }

    fn prune(&mut self) {
        let now = Instant::now();
        while self
            .recent
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) > self.retention)
        {
            self.recent.pop_front();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::Unit;
    use crate::test_utils::{baseline_record, snapshot};
    use pretty_assertions::assert_eq;

    fn config() -> AlertConfig {
        AlertConfig {
            cooldown_secs: 30,
            retention_secs: 300,
            retention_capacity: 4,
        }
    }

    fn latency_key() -> StreamKey {
        StreamKey::new("sub-0", "latency_ms")
    }

    // ========================================================================
    // Absolute rules
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_absolute_threshold_fires() {
        let mut evaluator = AlertEvaluator::with_default_rules(&config(), 20.0);
        let alerts = evaluator.evaluate_snapshot(&latency_key(), &snapshot(&[150.0, 160.0], Unit::Milliseconds));

        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.rule, "high_latency");
        assert_eq!(alert.metric_name, "latency_ms");
        assert_eq!(alert.source_id.as_deref(), Some("sub-0"));
        assert_eq!(alert.reference, AlertReference::Threshold { value: 100.0 });
        assert!((alert.observed_value - 155.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_threshold_is_silent() {
        let mut evaluator = AlertEvaluator::with_default_rules(&config(), 20.0);
        let alerts = evaluator.evaluate_snapshot(&latency_key(), &snapshot(&[5.0, 6.0], Unit::Milliseconds));
        assert!(alerts.is_empty());
        assert!(evaluator.active().is_empty());
    }

    // ========================================================================
    // Cooldown
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_oscillating_metric_alerts_once_per_cooldown() {
        let mut evaluator = AlertEvaluator::with_default_rules(&config(), 20.0);
        let high = snapshot(&[120.0], Unit::Milliseconds);
        let low = snapshot(&[80.0], Unit::Milliseconds);

        let mut raised = 0;
        for i in 0..20 {
            let snap = if i % 2 == 0 { &high } else { &low };
            raised += evaluator.evaluate_snapshot(&latency_key(), snap).len();
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(raised, 1);
        assert_eq!(evaluator.stats().suppressed, 9);

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(evaluator.evaluate_snapshot(&latency_key(), &high).len(), 1);
        assert_eq!(evaluator.stats().raised, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_is_per_metric_and_rule() {
        let mut evaluator = AlertEvaluator::with_default_rules(&config(), 20.0);
        evaluator.evaluate_snapshot(&latency_key(), &snapshot(&[150.0], Unit::Milliseconds));
        let loss = evaluator.evaluate_snapshot(
            &StreamKey::new("sub-0", "loss_rate"),
            &snapshot(&[0.2], Unit::Ratio),
        );
        assert_eq!(loss.len(), 1);
        assert_eq!(loss[0].severity, Severity::Error);
    }

    // ========================================================================
    // Baseline and regression
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_baseline_deviation() {
        let mut evaluator = AlertEvaluator::with_default_rules(&config(), 20.0);
        let record = baseline_record("latency_ms", &[10.0, 10.0], Unit::Milliseconds);

        let worse = record
            .compare(&snapshot(&[15.0], Unit::Milliseconds), "latency_ms", 20.0)
            .unwrap();
        let alerts = evaluator.evaluate_comparison(Some("sub-0"), &worse);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule, "baseline_deviation");
        assert!(matches!(
            alerts[0].reference,
            AlertReference::Baseline { delta_pct, .. } if (delta_pct - 50.0).abs() < 1e-9
        ));

        let better = record
            .compare(&snapshot(&[5.0], Unit::Milliseconds), "latency_ms", 20.0)
            .unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(evaluator.evaluate_comparison(Some("sub-0"), &better).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_regression_signal_alerts() {
        let mut evaluator = AlertEvaluator::with_default_rules(&config(), 20.0);
        let signal = RegressionSignal {
            key: latency_key(),
            degradation: 0.3,
            consecutive: 3,
            current_mean: 13.0,
            reference_mean: 10.0,
            current_p95: 14.0,
            reference_p95: 11.0,
        };
        let alerts = evaluator.evaluate_regression(&signal);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Error);
        assert!(alerts[0].message.contains("30.0%"));
    }

    // ========================================================================
    // Retention
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_retention_horizon_and_capacity() {
        let mut evaluator = AlertEvaluator::with_default_rules(&config(), 20.0);
        for i in 0..6 {
            let key = StreamKey::new(format!("sub-{i}"), format!("m{i}"));
            let rule = AlertRule::above("r", &[], 1.0, Severity::Info);
            evaluator.rules = vec![rule];
            evaluator.evaluate_snapshot(&key, &snapshot(&[5.0], Unit::Count));
        }
        let active = evaluator.active();
        assert_eq!(active.len(), 4);
        assert_eq!(active[0].metric_name, "m2");

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(evaluator.active().is_empty());
    }
}
