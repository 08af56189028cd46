//! Idle-system gate run before a baseline capture.
//!
//! Every CPU and memory sample seen during the validation window must stay
//! under its threshold; the first violation fails the gate immediately.
//! At the end of the window the CPU spread must also be small, and at least
//! one CPU sample must have arrived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BaselineConfig;
use crate::metrics::MetricSample;

/// Metric checked against the CPU threshold.
pub const IDLE_CPU_METRIC: &str = "cpu_percent";

/// Metric checked against the memory threshold.
pub const IDLE_MEMORY_METRIC: &str = "memory_percent";

/// Outcome of an idle validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleValidationResult {
    /// The system was confirmed idle.
    pub validated: bool,
    /// Validation was disabled by configuration.
    pub skipped: bool,
    /// CPU samples observed.
    pub samples: usize,
    /// Mean CPU over the window.
    pub cpu_mean: Option<f64>,
    /// CPU standard deviation over the window.
    pub cpu_stddev: Option<f64>,
    /// Highest memory reading.
    pub memory_peak: Option<f64>,
    /// Human-readable verdict.
    pub message: String,
    /// When the verdict was reached.
    pub checked_at: DateTime<Utc>,
}

impl IdleValidationResult {
    /// Result recorded when validation is disabled.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            validated: false,
            skipped: true,
            samples: 0,
            cpu_mean: None,
            cpu_stddev: None,
            memory_peak: None,
            message: "idle validation disabled".into(),
            checked_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn passed_for_testing() -> Self {
        Self {
            validated: true,
            skipped: false,
            samples: 60,
            cpu_mean: Some(5.0),
            cpu_stddev: Some(1.0),
            memory_peak: Some(40.0),
            message: "idle".into(),
            checked_at: Utc::now(),
        }
    }
}

/// Accumulates samples over one validation window.
#[derive(Debug, Clone)]
pub struct IdleValidator {
    cpu_threshold: f64,
    memory_threshold: f64,
    max_cpu_stddev: f64,
    cpu: Vec<f64>,
    memory_peak: Option<f64>,
}

impl IdleValidator {
    /// Create a validator from baseline configuration.
    #[must_use]
    pub const fn new(config: &BaselineConfig) -> Self {
        Self {
            cpu_threshold: config.idle_cpu_threshold_pct,
            memory_threshold: config.idle_memory_threshold_pct,
            max_cpu_stddev: config.idle_max_cpu_stddev,
            cpu: Vec::new(),
            memory_peak: None,
        }
    }

    /// Observe one sample.
    ///
    /// # Errors
    ///
    /// Returns the diagnostic reason on the first threshold violation.
    pub fn observe(&mut self, sample: &MetricSample) -> Result<(), String> {
        match sample.metric_name.as_str() {
            IDLE_CPU_METRIC => {
                if sample.value > self.cpu_threshold {
                    return Err(format!(
                        "{IDLE_CPU_METRIC} {:.1} above {:.1}",
                        sample.value, self.cpu_threshold
                    ));
                }
                self.cpu.push(sample.value);
            }
            IDLE_MEMORY_METRIC => {
                if sample.value > self.memory_threshold {
                    return Err(format!(
                        "{IDLE_MEMORY_METRIC} {:.1} above {:.1}",
                        sample.value, self.memory_threshold
                    ));
                }
                self.memory_peak = Some(self.memory_peak.map_or(sample.value, |p| p.max(sample.value)));
            }
            _ => {}
        }
        Ok(())
    }

    /// Close the window.
    ///
    /// # Errors
    ///
    /// Returns the diagnostic reason if no CPU samples arrived or CPU
    /// varied too much.
    pub fn finish(self) -> Result<IdleValidationResult, String> {
        if self.cpu.is_empty() {
            return Err(format!("no {IDLE_CPU_METRIC} samples received during validation window"));
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.cpu.len() as f64;
        let mean = self.cpu.iter().sum::<f64>() / n;
        let stddev = (self.cpu.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        if stddev > self.max_cpu_stddev {
            return Err(format!(
                "{IDLE_CPU_METRIC} unstable: stddev {stddev:.1} above {:.1}",
                self.max_cpu_stddev
            ));
        }
        Ok(IdleValidationResult {
            validated: true,
            skipped: false,
            samples: self.cpu.len(),
            cpu_mean: Some(mean),
            cpu_stddev: Some(stddev),
            memory_peak: self.memory_peak,
            message: format!("System idle: CPU avg={mean:.1}%, std={stddev:.1}%"),
            checked_at: Utc::now(),
        })
    }
}
