//! Alert rules and severities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Info,
    /// Worth a look.
    Warning,
    /// The system under test is misbehaving.
    Error,
    /// Immediate attention.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// What a rule checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Snapshot mean above a fixed value.
    Above {
        /// Limit.
        threshold: f64,
    },
    /// Snapshot mean below a fixed value.
    Below {
        /// Limit.
        threshold: f64,
    },
    /// Degraded from the active baseline by more than a percentage.
    BaselineDeviation {
        /// Allowed change in percent.
        tolerance_pct: f64,
    },
    /// Sustained regression against the trailing reference.
    Regression,
}

/// A named alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule name, part of the cooldown key.
    pub name: String,
    /// Metric names the rule applies to. Empty matches every metric.
    pub metrics: Vec<String>,
    /// Check performed.
    pub kind: RuleKind,
    /// Severity of raised alerts.
    pub severity: Severity,
}

impl AlertRule {
    /// Fire when `metric` averages above `threshold`.
    #[must_use]
    pub fn above(name: &str, metrics: &[&str], threshold: f64, severity: Severity) -> Self {
        Self::build(name, metrics, RuleKind::Above { threshold }, severity)
    }

    /// Fire when `metric` averages below `threshold`.
    #[must_use]
    pub fn below(name: &str, metrics: &[&str], threshold: f64, severity: Severity) -> Self {
        Self::build(name, metrics, RuleKind::Below { threshold }, severity)
    }

    /// Fire when any metric degrades from the baseline beyond `tolerance_pct`.
    #[must_use]
    pub fn baseline_deviation(name: &str, tolerance_pct: f64, severity: Severity) -> Self {
        Self::build(name, &[], RuleKind::BaselineDeviation { tolerance_pct }, severity)
    }

    /// Fire on every sustained regression signal.
    #[must_use]
    pub fn regression(name: &str, severity: Severity) -> Self {
        Self::build(name, &[], RuleKind::Regression, severity)
    }

    fn build(name: &str, metrics: &[&str], kind: RuleKind, severity: Severity) -> Self {
        Self {
            name: name.to_string(),
            metrics: metrics.iter().map(ToString::to_string).collect(),
            kind,
            severity,
        }
    }

    /// Whether the rule covers `metric`.
    #[must_use]
    pub fn applies_to(&self, metric: &str) -> bool {
        self.metrics.is_empty() || self.metrics.iter().any(|m| m == metric)
    }

    /// Absolute check against a snapshot mean. `None` for non-absolute rules.
    #[must_use]
    pub fn breached_by(&self, value: f64) -> Option<f64> {
        match self.kind {
            RuleKind::Above { threshold } if value > threshold => Some(threshold),
            RuleKind::Below { threshold } if value < threshold => Some(threshold),
            _ => None,
        }
    }
}

/// The stock rule set.
///
/// Latency over 100 ms and CPU or memory over 90% warn, loss over 5% is an
/// error. Baseline deviations beyond `tolerance_pct` warn and sustained
/// regressions are errors.
#[must_use]
pub fn default_rules(tolerance_pct: f64) -> Vec<AlertRule> {
    vec![
        AlertRule::above("high_latency", &["latency_ms"], 100.0, Severity::Warning),
        AlertRule::above("message_loss", &["loss_rate"], 0.05, Severity::Error),
        AlertRule::above("high_cpu", &["cpu_percent"], 90.0, Severity::Warning),
        AlertRule::above(
            "high_memory",
            &["memory_percent", "system_memory_percent"],
            90.0,
            Severity::Warning,
        ),
        AlertRule::baseline_deviation("baseline_deviation", tolerance_pct, Severity::Warning),
        AlertRule::regression("sustained_regression", Severity::Error),
    ]
}
