//! Error types for the stress orchestrator.
//!
//! This module defines a hierarchical error system:
//! - [`AppError`]: Top-level application errors
//! - [`ValidationError`]: Rejected scenario definitions, parameters and reports
//! - [`ComponentError`]: Stressor control round-trip failures
//! - [`BaselineError`]: Baseline lifecycle and comparison errors
//! - [`ScenarioError`]: Scenario engine errors
//! - [`StorageError`]: Baseline persistence errors
//! - [`McpError`]: MCP protocol errors
//! - [`ConfigError`]: Configuration errors
//!
//! All errors implement `Send + Sync` for async compatibility. Duplicate
//! metric samples are deliberately absent: they are counted, not raised.

use thiserror::Error;

/// Top-level application error.
///
/// This is the main error type returned by public API functions.
/// It wraps all subsystem errors for unified error handling.
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Stressor component error.
    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    /// Baseline error.
    #[error("Baseline error: {0}")]
    Baseline(#[from] BaselineError),

    /// Scenario error.
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// MCP protocol error.
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Validation errors.
///
/// Raised synchronously before anything is applied; a rejected request
/// never leaves partial state behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Scenario has no phases.
    #[error("Scenario {scenario} has no phases")]
    EmptyScenario {
        /// The scenario name.
        scenario: String,
    },

    /// A phase specification is malformed.
    #[error("Malformed phase {phase} in scenario {scenario}: {reason}")]
    MalformedPhase {
        /// The scenario name.
        scenario: String,
        /// The phase name.
        phase: String,
        /// Why the phase is malformed.
        reason: String,
    },

    /// Scenario exceeds the configured duration limit.
    #[error("Scenario {scenario} lasts {total_secs}s, limit is {limit_secs}s")]
    DurationExceeded {
        /// The scenario name.
        scenario: String,
        /// Total scenario duration in seconds.
        total_secs: u64,
        /// Configured limit in seconds.
        limit_secs: u64,
    },

    /// A parameter value is invalid.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// The parameter name.
        name: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A metric report could not be mapped.
    #[error("Malformed report from {source_id}: {reason}")]
    MalformedReport {
        /// The reporting source.
        source_id: String,
        /// Why the report is malformed.
        reason: String,
    },

    /// A scenario catalog could not be parsed.
    #[error("Invalid scenario catalog: {message}")]
    InvalidCatalog {
        /// Description of the parse failure.
        message: String,
    },
}

/// Stressor component errors.
///
/// These errors represent failures when commanding an external stressor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// The component did not answer within the timeout.
    #[error("Component {component_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The component identifier.
        component_id: String,
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The component refused the command.
    #[error("Component {component_id} rejected command: {message}")]
    Rejected {
        /// The component identifier.
        component_id: String,
        /// Rejection reason reported by the component.
        message: String,
    },

    /// The command could not be delivered.
    #[error("Component {component_id} transport failure: {message}")]
    Transport {
        /// The component identifier.
        component_id: String,
        /// Description of the delivery failure.
        message: String,
    },

    /// Retries were exhausted.
    #[error("Component {component_id} unreachable after {attempts} attempts")]
    Unreachable {
        /// The component identifier.
        component_id: String,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl ComponentError {
    /// Returns true if the command should be retried.
    ///
    /// Timeouts and transport failures are retryable. Rejections are not:
    /// resending the same parameters would be rejected again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }
}

/// Baseline errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BaselineError {
    /// A comparison was requested but no baseline is active.
    #[error("No active baseline")]
    NoBaseline,

    /// Operation requires a different baseline state.
    #[error("Baseline not ready: manager is {state}")]
    NotReady {
        /// Current manager state.
        state: String,
    },

    /// A capture or validation is already running.
    #[error("Baseline operation already in progress: {state}")]
    CaptureInProgress {
        /// Current manager state.
        state: String,
    },

    /// The system was not idle enough to capture a baseline.
    #[error("Idle validation failed: {reason}")]
    IdleValidationFailed {
        /// Diagnostic reason.
        reason: String,
    },

    /// Capture finished without usable data.
    #[error("Baseline rejected: {reason}")]
    Rejected {
        /// Why the capture was rejected.
        reason: String,
    },

    /// The active baseline holds no statistics for the metric.
    #[error("Metric {metric} not captured in baseline {baseline_id}")]
    MetricNotCaptured {
        /// The metric name.
        metric: String,
        /// The baseline identifier.
        baseline_id: String,
    },

    /// The baseline manager task is gone.
    #[error("Baseline manager unavailable")]
    ManagerUnavailable,
}

/// Scenario engine errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    /// A run is already active; the existing run is left untouched.
    #[error("Scenario {running} already running, cannot start {requested}")]
    ConcurrentScenarioConflict {
        /// The scenario currently running.
        running: String,
        /// The scenario that was requested.
        requested: String,
    },

    /// The scenario name is not registered.
    #[error("Unknown scenario: {name}")]
    UnknownScenario {
        /// The requested name.
        name: String,
    },

    /// A phase requires a baseline and none is active.
    #[error("Scenario {scenario} phase {phase} requires a baseline")]
    BaselineMissing {
        /// The scenario name.
        scenario: String,
        /// The phase name.
        phase: String,
    },

    /// No run is active.
    #[error("No scenario is running")]
    NotRunning,

    /// The scenario engine task is gone.
    #[error("Scenario engine unavailable")]
    EngineUnavailable,

    /// The definition failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Storage errors.
///
/// These errors represent failures in baseline persistence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Failed to connect to the database.
    #[error("Database connection failed: {message}")]
    ConnectionFailed {
        /// Description of the connection failure.
        message: String,
    },

    /// A database query failed.
    #[error("Query failed: {query} - {message}")]
    QueryFailed {
        /// The query that failed.
        query: String,
        /// Description of the failure.
        message: String,
    },

    /// Database migration failed.
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed {
        /// The migration version that failed.
        version: String,
        /// Description of the failure.
        message: String,
    },

    /// Stored baseline not found.
    #[error("Baseline not found: {baseline_id}")]
    BaselineNotFound {
        /// The baseline ID that was not found.
        baseline_id: String,
    },

    /// Stored artifact could not be encoded or decoded.
    #[error("Serialization failed: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },
}

/// MCP protocol errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum McpError {
    /// Invalid parameters for a tool.
    #[error("Invalid parameters for {tool}: {message}")]
    InvalidParameters {
        /// The tool name.
        tool: String,
        /// Description of what's invalid.
        message: String,
    },

    /// Transport failure.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

/// Configuration errors.
///
/// These errors represent failures in configuration loading and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}
