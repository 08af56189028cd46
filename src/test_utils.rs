//! Test utilities and fakes.
//!
//! This module provides shared testing infrastructure:
//! - [`RecordingStressor`]: a scriptable [`StressorControl`] that records calls
//! - Mock factories for [`MockStressorControl`]
//! - Baseline and sample fixtures
//!
//! Only compiled for tests (`#[cfg(test)]`).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::baseline::{BaselineRecord, CaptureSummary, IdleValidationResult};
use crate::config::ControlConfig;
use crate::control::{ComponentRole, StressorControlProxy};
use crate::error::ComponentError;
use crate::metrics::{StatisticsSnapshot, Unit};
use crate::traits::{ComponentHealth, ComponentStatus, MockStressorControl, ParameterSet, StressorControl};

/// Control settings with short timeouts and one retry.
#[must_use]
pub fn fast_control() -> ControlConfig {
    ControlConfig {
        timeout_ms: 100,
        max_retries: 1,
        backoff_ms: 10,
    }
}

/// A stressor that records every call.
#[derive(Debug, Default)]
pub struct RecordingStressor {
    applied: Mutex<Vec<ParameterSet>>,
    stops: AtomicUsize,
    reject_apply: AtomicBool,
    unhealthy: AtomicBool,
}

impl RecordingStressor {
    /// A stressor that acknowledges everything.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A stressor that rejects every apply.
    #[must_use]
    pub fn rejecting() -> Arc<Self> {
        let stressor = Self::default();
        stressor.reject_apply.store(true, Ordering::SeqCst);
        Arc::new(stressor)
    }

    /// Make status polls report degraded health.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Parameter sets applied so far.
    #[must_use]
    pub fn applied(&self) -> Vec<ParameterSet> {
        self.applied.lock().unwrap().clone()
    }

    /// Stop commands received.
    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StressorControl for RecordingStressor {
    async fn apply_parameters(&self, params: &ParameterSet) -> Result<(), ComponentError> {
        if self.reject_apply.load(Ordering::SeqCst) {
            return Err(ComponentError::Rejected {
                component_id: "recording".into(),
                message: "parameters refused".into(),
            });
        }
        self.applied.lock().unwrap().push(params.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self) -> Result<ComponentStatus, ComponentError> {
        let health = if self.unhealthy.load(Ordering::SeqCst) {
            ComponentHealth::Degraded
        } else {
            ComponentHealth::Healthy
        };
        Ok(ComponentStatus {
            component_id: "recording".into(),
            health,
            current_parameters: self.applied().last().cloned().unwrap_or_default(),
        })
    }
}

/// Wrap `control` in a proxy with [`fast_control`] settings.
#[must_use]
pub fn proxy(
    component_id: &str,
    role: ComponentRole,
    control: Arc<dyn StressorControl>,
) -> StressorControlProxy {
    StressorControlProxy::new(component_id, role, control, fast_control())
}

/// Create a mock stressor that acknowledges every command.
///
/// # Example
///
/// ```ignore
/// let mock = mock_stressor_ok("cpu-0");
/// assert!(mock.stop().await.is_ok());
/// ```
#[must_use]
pub fn mock_stressor_ok(component_id: &str) -> MockStressorControl {
    let id = component_id.to_string();
    let mut mock = MockStressorControl::new();
    mock.expect_apply_parameters().returning(|_| Ok(()));
    mock.expect_stop().returning(|| Ok(()));
    mock.expect_status().returning(move || {
        Ok(ComponentStatus {
            component_id: id.clone(),
            health: ComponentHealth::Healthy,
            current_parameters: ParameterSet::new(),
        })
    });
    mock
}

/// A snapshot of `values` in `unit`.
#[must_use]
pub fn snapshot(values: &[f64], unit: Unit) -> StatisticsSnapshot {
    let now = Utc::now();
    let points: Vec<_> = values.iter().map(|v| (now, *v)).collect();
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    StatisticsSnapshot::compute(&sorted, &points, unit).unwrap()
}

/// A finalized baseline holding one metric.
#[must_use]
pub fn baseline_record(metric: &str, values: &[f64], unit: Unit) -> BaselineRecord {
    let mut metrics = BTreeMap::new();
    metrics.insert(metric.to_string(), snapshot(values, unit));
    BaselineRecord::finalize(
        CaptureSummary {
            captured_at: Utc::now(),
            duration_secs: 60.0,
            metrics,
            sample_count: values.len(),
            idle_validation: IdleValidationResult::skipped(),
        },
        0.8,
        1,
    )
    .unwrap()
}
