//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading (with `.env` support)
//! - Configuration validation
//! - Default value handling
//!
//! # Example
//!
//! ```
//! use stress_orchestrator::config::{Config, DEFAULT_DATABASE_PATH};
//!
//! // Build a config directly (use Config::from_env() in production)
//! let config = Config::default();
//! assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
//! assert!(config.baseline.idle_validation_enabled);
//! ```

mod sections;
mod validation;

pub use sections::*;
pub use validation::{
    validate_config, MAX_CONTROL_RETRIES, MAX_CONTROL_TIMEOUT_MS, MAX_TICK_INTERVAL_MS,
    MIN_CONTROL_TIMEOUT_MS, MIN_TICK_INTERVAL_MS,
};

use std::str::FromStr;

use crate::error::ConfigError;

/// Default database path for the baseline store.
pub const DEFAULT_DATABASE_PATH: &str = "./data/baselines.db";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Baseline database path.
    pub database_path: String,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// Optional JSON scenario catalog merged over the built-in scenarios.
    pub scenarios_path: Option<String>,
    /// Stressor control settings.
    pub control: ControlConfig,
    /// Rolling statistics settings.
    pub statistics: StatisticsConfig,
    /// Baseline settings.
    pub baseline: BaselineConfig,
    /// Scenario engine settings.
    pub scenario: ScenarioConfig,
    /// Alert settings.
    pub alerts: AlertConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            scenarios_path: None,
            control: ControlConfig::default(),
            statistics: StatisticsConfig::default(),
            baseline: BaselineConfig::default(),
            scenario: ScenarioConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional:
    /// - `DATABASE_PATH`, `LOG_LEVEL`, `SCENARIOS_PATH`
    /// - `CONTROL_TIMEOUT_MS`, `CONTROL_MAX_RETRIES`, `CONTROL_BACKOFF_MS`
    /// - `WINDOW_CAPACITY`, `WINDOW_HORIZON_SECS`, `AGGREGATION_INTERVAL_MS`
    /// - `REGRESSION_THRESHOLD_PCT`, `REGRESSION_SUSTAIN`, `REGRESSION_REFERENCE_SIZE`
    /// - `BASELINE_DURATION_SECS`, `BASELINE_QUALITY_THRESHOLD`, `BASELINE_TOLERANCE_PCT`
    /// - `IDLE_VALIDATION_ENABLED`, `IDLE_VALIDATION_SECS`, `IDLE_CPU_THRESHOLD_PCT`,
    ///   `IDLE_MEMORY_THRESHOLD_PCT`
    /// - `TICK_INTERVAL_MS`, `BASELINE_POLICY` (`fail` or `block`), `AUTO_BASELINE`,
    ///   `MAX_SCENARIO_DURATION_SECS`
    /// - `ALERT_COOLDOWN_SECS`, `ALERT_RETENTION_SECS`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable does not parse or
    /// fails validation (see [`validate_config`]).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into());
        let scenarios_path = std::env::var("SCENARIOS_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        let control = ControlConfig {
            timeout_ms: parse_env("CONTROL_TIMEOUT_MS", DEFAULT_CONTROL_TIMEOUT_MS)?,
            max_retries: parse_env("CONTROL_MAX_RETRIES", DEFAULT_CONTROL_MAX_RETRIES)?,
            backoff_ms: parse_env("CONTROL_BACKOFF_MS", DEFAULT_CONTROL_BACKOFF_MS)?,
        };

        let statistics = StatisticsConfig {
            window_capacity: parse_env("WINDOW_CAPACITY", DEFAULT_WINDOW_CAPACITY)?,
            window_horizon_secs: parse_env("WINDOW_HORIZON_SECS", 0)?,
            regression_threshold_pct: parse_env(
                "REGRESSION_THRESHOLD_PCT",
                DEFAULT_REGRESSION_THRESHOLD_PCT,
            )?,
            regression_sustain: parse_env("REGRESSION_SUSTAIN", DEFAULT_REGRESSION_SUSTAIN)?,
            regression_reference_size: parse_env(
                "REGRESSION_REFERENCE_SIZE",
                DEFAULT_REGRESSION_REFERENCE_SIZE,
            )?,
            aggregation_interval_ms: parse_env(
                "AGGREGATION_INTERVAL_MS",
                DEFAULT_AGGREGATION_INTERVAL_MS,
            )?,
        };

        let baseline = BaselineConfig {
            duration_secs: parse_env("BASELINE_DURATION_SECS", DEFAULT_BASELINE_DURATION_SECS)?,
            idle_validation_enabled: parse_env_bool("IDLE_VALIDATION_ENABLED", true)?,
            idle_validation_secs: parse_env("IDLE_VALIDATION_SECS", DEFAULT_IDLE_VALIDATION_SECS)?,
            idle_cpu_threshold_pct: parse_env(
                "IDLE_CPU_THRESHOLD_PCT",
                DEFAULT_IDLE_CPU_THRESHOLD_PCT,
            )?,
            idle_memory_threshold_pct: parse_env(
                "IDLE_MEMORY_THRESHOLD_PCT",
                DEFAULT_IDLE_MEMORY_THRESHOLD_PCT,
            )?,
            idle_max_cpu_stddev: DEFAULT_IDLE_MAX_CPU_STDDEV,
            quality_threshold: parse_env(
                "BASELINE_QUALITY_THRESHOLD",
                DEFAULT_BASELINE_QUALITY_THRESHOLD,
            )?,
            tolerance_pct: parse_env("BASELINE_TOLERANCE_PCT", DEFAULT_BASELINE_TOLERANCE_PCT)?,
            min_samples: DEFAULT_BASELINE_MIN_SAMPLES,
        };

        let scenario = ScenarioConfig {
            tick_interval_ms: parse_env("TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?,
            baseline_policy: parse_env("BASELINE_POLICY", BaselinePolicy::Fail)?,
            auto_baseline: parse_env_bool("AUTO_BASELINE", false)?,
            max_scenario_duration_secs: parse_env(
                "MAX_SCENARIO_DURATION_SECS",
                DEFAULT_MAX_SCENARIO_DURATION_SECS,
            )?,
            health_poll_ticks: DEFAULT_HEALTH_POLL_TICKS,
        };

        let alerts = AlertConfig {
            cooldown_secs: parse_env("ALERT_COOLDOWN_SECS", DEFAULT_ALERT_COOLDOWN_SECS)?,
            retention_secs: parse_env("ALERT_RETENTION_SECS", DEFAULT_ALERT_RETENTION_SECS)?,
            retention_capacity: DEFAULT_ALERT_RETENTION_CAPACITY,
        };

        let config = Self {
            database_path,
            log_level,
            scenarios_path,
            control,
            statistics,
            baseline,
            scenario,
            alerts,
        };

        validate_config(&config)?;
        Ok(config)
    }
}

/// Parse an environment variable, using a default if not set.
fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: format!("could not parse '{val}'"),
        })
    })
}

/// Parse a boolean environment variable (`true/false/1/0/yes/no`).
fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        match val.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var: name.into(),
                reason: "must be true or false".into(),
            }),
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "DATABASE_PATH",
        "LOG_LEVEL",
        "SCENARIOS_PATH",
        "CONTROL_TIMEOUT_MS",
        "CONTROL_MAX_RETRIES",
        "TICK_INTERVAL_MS",
        "BASELINE_POLICY",
        "IDLE_VALIDATION_ENABLED",
        "IDLE_CPU_THRESHOLD_PCT",
        "REGRESSION_SUSTAIN",
        "AUTO_BASELINE",
    ];

    /// Helper to set up a clean test environment.
    fn setup_test_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        setup_test_env();

        let config = Config::from_env().expect("should load config");

        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.scenarios_path, None);
        assert_eq!(config.control, ControlConfig::default());
        assert_eq!(config.scenario, ScenarioConfig::default());
    }

    #[test]
    #[serial]
    fn test_config_from_env_with_overrides() {
        setup_test_env();

        env::set_var("DATABASE_PATH", "/tmp/custom.db");
        env::set_var("SCENARIOS_PATH", "/etc/scenarios.json");
        env::set_var("CONTROL_TIMEOUT_MS", "5000");
        env::set_var("TICK_INTERVAL_MS", "100");
        env::set_var("BASELINE_POLICY", "block");
        env::set_var("IDLE_VALIDATION_ENABLED", "false");
        env::set_var("IDLE_CPU_THRESHOLD_PCT", "25.5");
        env::set_var("AUTO_BASELINE", "yes");

        let config = Config::from_env().expect("should load config");

        assert_eq!(config.database_path, "/tmp/custom.db");
        assert_eq!(config.scenarios_path.as_deref(), Some("/etc/scenarios.json"));
        assert_eq!(config.control.timeout_ms, 5000);
        assert_eq!(config.scenario.tick_interval_ms, 100);
        assert_eq!(config.scenario.baseline_policy, BaselinePolicy::Block);
        assert!(config.scenario.auto_baseline);
        assert!(!config.baseline.idle_validation_enabled);
        assert!((config.baseline.idle_cpu_threshold_pct - 25.5).abs() < f64::EPSILON);

        setup_test_env();
    }

    #[test]
    #[serial]
    fn test_config_invalid_number() {
        setup_test_env();
        env::set_var("CONTROL_MAX_RETRIES", "lots");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "CONTROL_MAX_RETRIES"
        ));

        setup_test_env();
    }

    #[test]
    #[serial]
    fn test_config_invalid_policy() {
        setup_test_env();
        env::set_var("BASELINE_POLICY", "maybe");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "BASELINE_POLICY"
        ));

        setup_test_env();
    }

    #[test]
    #[serial]
    fn test_config_tick_out_of_range_fails_validation() {
        setup_test_env();
        env::set_var("TICK_INTERVAL_MS", "50");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "TICK_INTERVAL_MS"
        ));

        setup_test_env();
    }

    #[test]
    #[serial]
    fn test_config_invalid_bool() {
        setup_test_env();
        env::set_var("IDLE_VALIDATION_ENABLED", "sometimes");

        assert!(Config::from_env().is_err());

        setup_test_env();
    }
}
