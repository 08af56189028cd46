//! Per-subsystem configuration sections.
//!
//! Each section has a `Default` matching the documented environment
//! defaults, so tests and embedders can build one without touching the
//! environment.
//!
//! # Example
//!
//! ```
//! use stress_orchestrator::config::{BaselinePolicy, ScenarioConfig};
//!
//! let config = ScenarioConfig::default();
//! assert_eq!(config.tick_interval_ms, 250);
//! assert_eq!(config.baseline_policy, BaselinePolicy::Fail);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-attempt control timeout in milliseconds.
pub const DEFAULT_CONTROL_TIMEOUT_MS: u64 = 3_000;

/// Default retries before a component is marked unreachable.
pub const DEFAULT_CONTROL_MAX_RETRIES: u32 = 3;

/// Default initial retry backoff in milliseconds.
pub const DEFAULT_CONTROL_BACKOFF_MS: u64 = 200;

/// Default per-stream window capacity.
pub const DEFAULT_WINDOW_CAPACITY: usize = 1024;

/// Default regression threshold (percent).
pub const DEFAULT_REGRESSION_THRESHOLD_PCT: f64 = 20.0;

/// Default consecutive evaluations before a regression alerts.
pub const DEFAULT_REGRESSION_SUSTAIN: u32 = 3;

/// Default trailing reference size, in evaluations.
pub const DEFAULT_REGRESSION_REFERENCE_SIZE: usize = 10;

/// Default aggregation cadence in milliseconds.
pub const DEFAULT_AGGREGATION_INTERVAL_MS: u64 = 1_000;

/// Default baseline capture duration (5 minutes).
pub const DEFAULT_BASELINE_DURATION_SECS: u64 = 300;

/// Default idle validation window.
pub const DEFAULT_IDLE_VALIDATION_SECS: u64 = 60;

/// Default idle CPU limit (percent).
pub const DEFAULT_IDLE_CPU_THRESHOLD_PCT: f64 = 30.0;

/// Default idle memory limit (percent).
pub const DEFAULT_IDLE_MEMORY_THRESHOLD_PCT: f64 = 85.0;

/// Default CPU standard deviation above which the system is too unstable for a baseline.
pub const DEFAULT_IDLE_MAX_CPU_STDDEV: f64 = 10.0;

/// Default quality score below which a baseline carries a warning.
pub const DEFAULT_BASELINE_QUALITY_THRESHOLD: f64 = 0.8;

/// Default tolerance for baseline comparisons (percent).
pub const DEFAULT_BASELINE_TOLERANCE_PCT: f64 = 20.0;

/// Default minimum samples for a trustworthy baseline.
pub const DEFAULT_BASELINE_MIN_SAMPLES: usize = 30;

/// Default scenario tick in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 250;

/// Default scenario duration safety limit (1 hour).
pub const DEFAULT_MAX_SCENARIO_DURATION_SECS: u64 = 3_600;

/// Default number of ticks between component health polls.
pub const DEFAULT_HEALTH_POLL_TICKS: u32 = 20;

/// Default alert cooldown per (metric, rule).
pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 30;

/// Default alert retention horizon (5 minutes).
pub const DEFAULT_ALERT_RETENTION_SECS: u64 = 300;

/// Default maximum retained alerts.
pub const DEFAULT_ALERT_RETENTION_CAPACITY: usize = 256;

/// What a `baseline_required` phase does when no baseline is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Fail the start (or the run) with `BaselineMissing`.
    Fail,
    /// Pause the run, capture a baseline on demand, then continue.
    Block,
}

impl FromStr for BaselinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "block" => Ok(Self::Block),
            other => Err(format!("expected 'fail' or 'block', got '{other}'")),
        }
    }
}

impl fmt::Display for BaselinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Stressor control round-trip settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff; doubled after each failed attempt.
    pub backoff_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
            max_retries: DEFAULT_CONTROL_MAX_RETRIES,
            backoff_ms: DEFAULT_CONTROL_BACKOFF_MS,
        }
    }
}

impl ControlConfig {
    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Backoff before retry number `attempt` (1-based), capped at 30s.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1_u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(30_000))
    }
}

/// Rolling statistics and regression settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsConfig {
    /// Maximum samples per stream window.
    pub window_capacity: usize,
    /// Time horizon per stream window; `0` disables the horizon bound.
    pub window_horizon_secs: u64,
    /// Fractional degradation threshold, as a percentage.
    pub regression_threshold_pct: f64,
    /// Consecutive exceeding evaluations before a regression is raised.
    pub regression_sustain: u32,
    /// Number of trailing evaluations forming the reference.
    pub regression_reference_size: usize,
    /// Cadence of snapshot evaluation in milliseconds.
    pub aggregation_interval_ms: u64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            window_horizon_secs: 0,
            regression_threshold_pct: DEFAULT_REGRESSION_THRESHOLD_PCT,
            regression_sustain: DEFAULT_REGRESSION_SUSTAIN,
            regression_reference_size: DEFAULT_REGRESSION_REFERENCE_SIZE,
            aggregation_interval_ms: DEFAULT_AGGREGATION_INTERVAL_MS,
        }
    }
}

impl StatisticsConfig {
    /// Window time horizon, if enabled.
    #[must_use]
    pub const fn window_horizon(&self) -> Option<Duration> {
        if self.window_horizon_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.window_horizon_secs))
        }
    }
}

/// Baseline capture settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineConfig {
    /// Capture duration in seconds.
    pub duration_secs: u64,
    /// Whether captures must pass idle validation first.
    pub idle_validation_enabled: bool,
    /// Idle validation window in seconds.
    pub idle_validation_secs: u64,
    /// Idle CPU limit (percent).
    pub idle_cpu_threshold_pct: f64,
    /// Idle memory limit (percent).
    pub idle_memory_threshold_pct: f64,
    /// CPU standard deviation limit during idle validation.
    pub idle_max_cpu_stddev: f64,
    /// Quality score below which the baseline carries a warning.
    pub quality_threshold: f64,
    /// Tolerance for `compare`, as a percentage.
    pub tolerance_pct: f64,
    /// Sample count below which the baseline carries a warning.
    pub min_samples: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_BASELINE_DURATION_SECS,
            idle_validation_enabled: true,
            idle_validation_secs: DEFAULT_IDLE_VALIDATION_SECS,
            idle_cpu_threshold_pct: DEFAULT_IDLE_CPU_THRESHOLD_PCT,
            idle_memory_threshold_pct: DEFAULT_IDLE_MEMORY_THRESHOLD_PCT,
            idle_max_cpu_stddev: DEFAULT_IDLE_MAX_CPU_STDDEV,
            quality_threshold: DEFAULT_BASELINE_QUALITY_THRESHOLD,
            tolerance_pct: DEFAULT_BASELINE_TOLERANCE_PCT,
            min_samples: DEFAULT_BASELINE_MIN_SAMPLES,
        }
    }
}

/// Scenario engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Behaviour of `baseline_required` phases without a baseline.
    pub baseline_policy: BaselinePolicy,
    /// Capture a baseline before any scenario when none is active.
    pub auto_baseline: bool,
    /// Upper bound for a scenario's total duration.
    pub max_scenario_duration_secs: u64,
    /// Ticks between component health polls.
    pub health_poll_ticks: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            baseline_policy: BaselinePolicy::Fail,
            auto_baseline: false,
            max_scenario_duration_secs: DEFAULT_MAX_SCENARIO_DURATION_SECS,
            health_poll_ticks: DEFAULT_HEALTH_POLL_TICKS,
        }
    }
}

impl ScenarioConfig {
    /// Tick interval.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Alert evaluation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    /// Minimum seconds between alerts for the same (metric, rule).
    pub cooldown_secs: u64,
    /// How long raised alerts stay queryable.
    pub retention_secs: u64,
    /// Maximum retained alerts.
    pub retention_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_ALERT_COOLDOWN_SECS,
            retention_secs: DEFAULT_ALERT_RETENTION_SECS,
            retention_capacity: DEFAULT_ALERT_RETENTION_CAPACITY,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("fail", BaselinePolicy::Fail ; "lowercase fail")]
    #[test_case("BLOCK", BaselinePolicy::Block ; "uppercase block")]
    fn test_baseline_policy_from_str(input: &str, expected: BaselinePolicy) {
        assert_eq!(input.parse::<BaselinePolicy>().unwrap(), expected);
    }

    #[test]
    fn test_baseline_policy_rejects_unknown() {
        assert!("wait".parse::<BaselinePolicy>().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = ControlConfig {
            backoff_ms: 100,
            ..ControlConfig::default()
        };
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(400));
        assert_eq!(config.backoff_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_window_horizon_disabled_by_zero() {
        let mut config = StatisticsConfig::default();
        assert_eq!(config.window_horizon(), None);
        config.window_horizon_secs = 60;
        assert_eq!(config.window_horizon(), Some(Duration::from_secs(60)));
    }
}
