//! Trait definitions for mockable dependencies.
//!
//! This module defines:
//! - [`StressorControl`]: the control surface of an external stressor component
//! - [`ParameterSet`] and [`ComponentStatus`]: the values crossing that surface
//! - [`BaselineStore`]: persistence of finalized baselines
//!
//! # Mocking
//!
//! Traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::baseline::BaselineRecord;
use crate::error::{ComponentError, StorageError};

/// Named parameters applied to one component, e.g. `{"cpu_intensity": 0.5}`.
pub type ParameterSet = BTreeMap<String, serde_json::Value>;

/// Health of a stressor component as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentHealth {
    /// Acknowledging commands.
    Healthy,
    /// Failed at least one command; still commanded.
    Degraded,
    /// Stop retries exhausted.
    Unreachable,
}

impl fmt::Display for ComponentHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Status reported by a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Component identifier.
    pub component_id: String,
    /// Self-reported health.
    pub health: ComponentHealth,
    /// Parameters the component is running with.
    pub current_parameters: ParameterSet,
}

/// Control surface of one external stressor.
///
/// Commands are at-least-once: implementations must treat a repeated
/// `apply_parameters` with the same set, or a repeated `stop`, as a no-op.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StressorControl: Send + Sync {
    /// Apply a parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError`] if the component rejects or never
    /// acknowledges the command.
    async fn apply_parameters(&self, params: &ParameterSet) -> Result<(), ComponentError>;

    /// Stop generating load.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError`] if the command is not acknowledged.
    async fn stop(&self) -> Result<(), ComponentError>;

    /// Current status.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError`] if the component cannot be reached.
    async fn status(&self) -> Result<ComponentStatus, ComponentError>;
}

/// Summary row of a stored baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBaseline {
    /// Baseline identifier.
    pub id: String,
    /// When capture started.
    pub captured_at: chrono::DateTime<chrono::Utc>,
    /// When it was saved.
    pub saved_at: chrono::DateTime<chrono::Utc>,
    /// Quality grade.
    pub quality: String,
    /// Quality score.
    pub quality_score: f64,
    /// Samples captured.
    pub sample_count: u64,
}

/// Baseline persistence.
///
/// Records are opaque artifacts: what is saved is exactly what is loaded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Save a record, replacing any record with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    async fn save(&self, record: &BaselineRecord) -> Result<StoredBaseline, StorageError>;

    /// Load a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BaselineNotFound`] for an unknown id.
    async fn load(&self, id: &str) -> Result<BaselineRecord, StorageError>;

    /// Load the most recently saved record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    async fn load_latest(&self) -> Result<Option<BaselineRecord>, StorageError>;

    /// List saved records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    async fn list(&self, limit: u32) -> Result<Vec<StoredBaseline>, StorageError>;
}
