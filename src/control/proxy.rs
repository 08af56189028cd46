//! Command dispatch for one stressor component.
//!
//! Every round-trip carries the configured timeout. Timeouts and transport
//! failures are retried with exponential backoff; rejections are returned
//! immediately.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::config::ControlConfig;
use crate::error::ComponentError;
use crate::traits::{ComponentHealth, ComponentStatus, ParameterSet, StressorControl};

use super::health::{HealthStats, HealthTracker};
use super::role::ComponentRole;

/// Proxy wrapping a [`StressorControl`] with timeouts, retries and health.
pub struct StressorControlProxy {
    component_id: String,
    role: ComponentRole,
    control: Arc<dyn StressorControl>,
    config: ControlConfig,
    health: Mutex<HealthTracker>,
    last_applied: Mutex<Option<ParameterSet>>,
}

impl std::fmt::Debug for StressorControlProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StressorControlProxy")
            .field("component_id", &self.component_id)
            .field("role", &self.role)
            .field("health", &self.health())
            .finish_non_exhaustive()
    }
}

/// Serializable view of a proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Component identifier.
    pub component_id: String,
    /// Role the component plays in scenarios.
    pub role: ComponentRole,
    /// Health counters.
    pub health: HealthStats,
    /// Parameters last acknowledged, if any.
    pub last_applied: Option<ParameterSet>,
}

impl StressorControlProxy {
    /// Create a proxy.
    pub fn new(
        component_id: impl Into<String>,
        role: ComponentRole,
        control: Arc<dyn StressorControl>,
        config: ControlConfig,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            role,
            control,
            config,
            health: Mutex::new(HealthTracker::new()),
            last_applied: Mutex::new(None),
        }
    }

    /// Component identifier.
    #[must_use]
    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// Scenario role.
    #[must_use]
    pub const fn role(&self) -> ComponentRole {
        self.role
    }

    fn tracker(&self) -> MutexGuard<'_, HealthTracker> {
        match self.health.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(component = %self.component_id, "Health mutex poisoned, using recovered data");
                poisoned.into_inner()
            }
        }
    }

    fn applied(&self) -> MutexGuard<'_, Option<ParameterSet>> {
        match self.last_applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> ComponentHealth {
        self.tracker().state()
    }

    /// Parameters last acknowledged.
    #[must_use]
    pub fn last_applied(&self) -> Option<ParameterSet> {
        self.applied().clone()
    }

    /// Serializable view.
    #[must_use]
    pub fn snapshot(&self) -> ComponentSnapshot {
        ComponentSnapshot {
            component_id: self.component_id.clone(),
            role: self.role,
            health: self.tracker().stats(),
            last_applied: self.last_applied(),
        }
    }

    async fn round_trip<T, F, Fut>(&self, command: &'static str, mut op: F) -> Result<T, ComponentError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ComponentError>> + Send,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let result = tokio::time::timeout(self.config.timeout(), op())
                .await
                .unwrap_or_else(|_| {
                    Err(ComponentError::Timeout {
                        component_id: self.component_id.clone(),
                        timeout_ms: self.config.timeout_ms,
                    })
                });
            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(component = %self.component_id, command, attempt, "Component acknowledged after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        component = %self.component_id,
                        command,
                        attempt,
                        error = %e,
                        "Component round-trip failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.backoff_for(attempt)).await;
                    }
                }
            }
        }
        Err(ComponentError::Unreachable {
            component_id: self.component_id.clone(),
            attempts,
        })
    }

    /// Apply `params`; failure degrades the component.
    ///
    /// # Errors
    ///
    /// Returns the rejection, or [`ComponentError::Unreachable`] once
    /// retries are exhausted.
    pub async fn apply(&self, params: &ParameterSet) -> Result<(), ComponentError> {
        let control = Arc::clone(&self.control);
        let result = self
            .round_trip("apply_parameters", || {
                let control = Arc::clone(&control);
                let params = params.clone();
                async move { control.apply_parameters(&params).await }
            })
            .await;
        match &result {
            Ok(()) => {
                self.tracker().record_success();
                *self.applied() = Some(params.clone());
                tracing::debug!(component = %self.component_id, "Parameters applied");
            }
            Err(e) => {
                self.tracker().record_failure(e.to_string());
                tracing::warn!(component = %self.component_id, error = %e, "Component degraded");
            }
        }
        result
    }

    /// Stop the component; exhausting retries marks it unreachable.
    ///
    /// # Errors
    ///
    /// Returns the rejection, or [`ComponentError::Unreachable`] once
    /// retries are exhausted.
    pub async fn stop(&self) -> Result<(), ComponentError> {
        let control = Arc::clone(&self.control);
        let result = self
            .round_trip("stop", || {
                let control = Arc::clone(&control);
                async move { control.stop().await }
            })
            .await;
        match &result {
            Ok(()) => {
                self.tracker().record_success();
                *self.applied() = None;
                tracing::info!(component = %self.component_id, "Component stopped");
            }
            Err(e @ ComponentError::Unreachable { .. }) => {
                self.tracker().mark_unreachable(e.to_string());
                tracing::warn!(component = %self.component_id, error = %e, "Component unreachable");
            }
            Err(e) => {
                self.tracker().record_failure(e.to_string());
                tracing::warn!(component = %self.component_id, error = %e, "Stop rejected");
            }
        }
        result
    }

    /// Poll status once, without retries.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError`] if the poll fails or times out.
    pub async fn poll_status(&self) -> Result<ComponentStatus, ComponentError> {
        let result = tokio::time::timeout(self.config.timeout(), self.control.status())
            .await
            .unwrap_or_else(|_| {
                Err(ComponentError::Timeout {
                    component_id: self.component_id.clone(),
                    timeout_ms: self.config.timeout_ms,
                })
            });
        match &result {
            Ok(status) if status.health == ComponentHealth::Healthy => {
                self.tracker().record_success();
            }
            Ok(status) => {
                self.tracker()
                    .record_failure(format!("component reports {}", status.health));
            }
            Err(e) => {
                self.tracker().record_failure(e.to_string());
                tracing::warn!(component = %self.component_id, error = %e, "Status poll failed");
            }
        }
        result
    }
}
