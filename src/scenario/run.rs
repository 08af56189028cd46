//! Run status and events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::control::ComponentSnapshot;

/// Lifecycle of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing has run yet.
    Idle,
    /// A phase is executing.
    Running,
    /// Waiting for a baseline before the next phase can start.
    Paused,
    /// Every phase finished.
    Completed,
    /// Stopped on request or at shutdown.
    Aborted,
    /// Stopped by an error.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

impl RunStatus {
    /// Running or paused.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Completed, aborted or failed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed { .. })
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Published view of the current or last run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    /// Run identifier.
    pub run_id: Option<String>,
    /// Scenario name.
    pub scenario: Option<String>,
    /// Lifecycle state.
    pub status: RunStatus,
    /// Index of the current (or last) phase.
    pub phase_index: Option<usize>,
    /// Name of the current (or last) phase.
    pub phase_name: Option<String>,
    /// Number of phases.
    pub phase_count: usize,
    /// When the current phase started.
    pub phase_started_at: Option<DateTime<Utc>>,
    /// When the run started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Seconds since the run started, pauses included.
    pub elapsed_secs: f64,
    /// Fraction of the current phase elapsed.
    pub phase_progress: f64,
    /// Fraction of the scenario's phase time elapsed.
    pub scenario_progress: f64,
    /// Blocked on a baseline capture.
    pub waiting_for_baseline: bool,
    /// Components commanded during the run, with their last-applied parameters.
    pub components: Vec<ComponentSnapshot>,
    /// When this view was published.
    pub updated_at: DateTime<Utc>,
}

impl Default for ScenarioRun {
    fn default() -> Self {
        Self {
            run_id: None,
            scenario: None,
            status: RunStatus::Idle,
            phase_index: None,
            phase_name: None,
            phase_count: 0,
            phase_started_at: None,
            started_at: None,
            finished_at: None,
            elapsed_secs: 0.0,
            phase_progress: 0.0,
            scenario_progress: 0.0,
            waiting_for_baseline: false,
            components: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Phase-progress channel payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScenarioEvent {
    /// A run was accepted.
    Started {
        /// Run identifier.
        run_id: String,
        /// Scenario name.
        scenario: String,
        /// Number of phases.
        phase_count: usize,
        /// Event time.
        at: DateTime<Utc>,
    },
    /// A phase began.
    PhaseStarted {
        /// Run identifier.
        run_id: String,
        /// Phase index.
        phase_index: usize,
        /// Phase name.
        phase_name: String,
        /// Event time.
        at: DateTime<Utc>,
    },
    /// Periodic progress.
    Progress {
        /// Run identifier.
        run_id: String,
        /// Phase index.
        phase_index: usize,
        /// Fraction of the phase elapsed.
        phase_progress: f64,
        /// Fraction of the scenario elapsed.
        scenario_progress: f64,
        /// Seconds since start.
        elapsed_secs: f64,
    },
    /// The run is waiting for a baseline.
    Paused {
        /// Run identifier.
        run_id: String,
        /// Phase waiting to start.
        phase_index: usize,
        /// Why the run is paused.
        reason: String,
    },
    /// A component failed a command or a health poll.
    ComponentDegraded {
        /// Run identifier.
        run_id: String,
        /// Component identifier.
        component_id: String,
        /// Diagnostic.
        error: String,
    },
    /// The run reached a terminal state.
    Finished {
        /// Run identifier.
        run_id: String,
        /// Scenario name.
        scenario: String,
        /// Final state.
        status: RunStatus,
        /// Event time.
        at: DateTime<Utc>,
    },
}

impl ScenarioEvent {
    /// Run the event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::Started { run_id, .. }
            | Self::PhaseStarted { run_id, .. }
            | Self::Progress { run_id, .. }
            | Self::Paused { run_id, .. }
            | Self::ComponentDegraded { run_id, .. }
            | Self::Finished { run_id, .. } => run_id,
        }
    }
}
