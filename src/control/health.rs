//! Per-component health tracking.
//!
//! A failed apply or status poll degrades the component; exhausting the
//! stop retries marks it unreachable. Any acknowledged command restores it.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::traits::ComponentHealth;

/// Health tracker for one component.
#[derive(Debug)]
pub struct HealthTracker {
    state: ComponentHealth,
    consecutive_failures: u32,
    total_failures: u64,
    total_successes: u64,
    last_failure: Option<Instant>,
    last_error: Option<String>,
}

/// Point-in-time health counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStats {
    /// Current state.
    pub state: ComponentHealth,
    /// Failures since the last acknowledged command.
    pub consecutive_failures: u32,
    /// Failures since creation.
    pub total_failures: u64,
    /// Acknowledged commands since creation.
    pub total_successes: u64,
    /// Most recent error message.
    pub last_error: Option<String>,
    /// Milliseconds since the most recent failure.
    pub since_last_failure_ms: Option<u64>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    /// Create a healthy tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ComponentHealth::Healthy,
            consecutive_failures: 0,
            total_failures: 0,
            total_successes: 0,
            last_failure: None,
            last_error: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ComponentHealth {
        self.state
    }

    /// Record an acknowledged command.
    pub fn record_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_failures = 0;
        self.state = ComponentHealth::Healthy;
    }

    /// Record a failed command; an unreachable component stays unreachable.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_failure = Some(Instant::now());
        self.last_error = Some(error.into());
        if self.state == ComponentHealth::Healthy {
            self.state = ComponentHealth::Degraded;
        }
    }

    /// Mark the component unreachable.
    pub fn mark_unreachable(&mut self, error: impl Into<String>) {
        self.record_failure(error);
        self.state = ComponentHealth::Unreachable;
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> HealthStats {
        HealthStats {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
            last_error: self.last_error.clone(),
            since_last_failure_ms: self
                .last_failure
                .map(|t| u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX)),
        }
    }
}
