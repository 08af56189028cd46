//! Configuration validation.
//!
//! This module provides validation logic for configuration values,
//! ensuring they are within acceptable ranges.

use super::Config;
use crate::error::ConfigError;

/// Minimum scenario tick in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;

/// Maximum scenario tick in milliseconds.
pub const MAX_TICK_INTERVAL_MS: u64 = 500;

/// Minimum control timeout in milliseconds.
pub const MIN_CONTROL_TIMEOUT_MS: u64 = 100;

/// Maximum control timeout in milliseconds (1 minute).
pub const MAX_CONTROL_TIMEOUT_MS: u64 = 60_000;

/// Maximum allowed control retry count.
pub const MAX_CONTROL_RETRIES: u32 = 10;

/// Maximum per-stream window capacity.
pub const MAX_WINDOW_CAPACITY: usize = 1_000_000;

fn invalid(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.into(),
        reason: reason.into(),
    }
}

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming the first variable that is
/// out of range.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let scenario = &config.scenario;
    if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&scenario.tick_interval_ms) {
        return Err(invalid(
            "TICK_INTERVAL_MS",
            format!("must be between {MIN_TICK_INTERVAL_MS} and {MAX_TICK_INTERVAL_MS}"),
        ));
    }
    if scenario.max_scenario_duration_secs == 0 {
        return Err(invalid("MAX_SCENARIO_DURATION_SECS", "must be positive"));
    }

    let control = &config.control;
    if !(MIN_CONTROL_TIMEOUT_MS..=MAX_CONTROL_TIMEOUT_MS).contains(&control.timeout_ms) {
        return Err(invalid(
            "CONTROL_TIMEOUT_MS",
            format!("must be between {MIN_CONTROL_TIMEOUT_MS} and {MAX_CONTROL_TIMEOUT_MS} ms"),
        ));
    }
    if control.max_retries > MAX_CONTROL_RETRIES {
        return Err(invalid(
            "CONTROL_MAX_RETRIES",
            format!("must be between 0 and {MAX_CONTROL_RETRIES}"),
        ));
    }

    let stats = &config.statistics;
    if !(2..=MAX_WINDOW_CAPACITY).contains(&stats.window_capacity) {
        return Err(invalid(
            "WINDOW_CAPACITY",
            format!("must be between 2 and {MAX_WINDOW_CAPACITY}"),
        ));
    }
    if !(stats.regression_threshold_pct > 0.0 && stats.regression_threshold_pct.is_finite()) {
        return Err(invalid("REGRESSION_THRESHOLD_PCT", "must be a positive number"));
    }
    if stats.regression_sustain == 0 {
        return Err(invalid("REGRESSION_SUSTAIN", "must be at least 1"));
    }
    if stats.regression_reference_size == 0 {
        return Err(invalid("REGRESSION_REFERENCE_SIZE", "must be at least 1"));
    }
    if stats.aggregation_interval_ms == 0 {
        return Err(invalid("AGGREGATION_INTERVAL_MS", "must be positive"));
    }

    let baseline = &config.baseline;
    if baseline.duration_secs == 0 {
        return Err(invalid("BASELINE_DURATION_SECS", "must be positive"));
    }
    if baseline.idle_validation_enabled && baseline.idle_validation_secs == 0 {
        return Err(invalid("IDLE_VALIDATION_SECS", "must be positive"));
    }
    if !(0.0..=1.0).contains(&baseline.quality_threshold) {
        return Err(invalid("BASELINE_QUALITY_THRESHOLD", "must be between 0 and 1"));
    }
    if !(baseline.tolerance_pct > 0.0 && baseline.tolerance_pct.is_finite()) {
        return Err(invalid("BASELINE_TOLERANCE_PCT", "must be a positive number"));
    }
    for (var, value) in [
        ("IDLE_CPU_THRESHOLD_PCT", baseline.idle_cpu_threshold_pct),
        ("IDLE_MEMORY_THRESHOLD_PCT", baseline.idle_memory_threshold_pct),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid(var, "must be a percentage between 0 and 100"));
        }
    }

    if config.alerts.retention_secs == 0 {
        return Err(invalid("ALERT_RETENTION_SECS", "must be positive"));
    }

    Ok(())
}
