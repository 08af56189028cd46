//! Status views returned by the facade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::Alert;
use crate::baseline::{ActiveBaselineSummary, BaselineStatus};
use crate::control::ComponentSnapshot;
use crate::metrics::{AggregatedMetrics, IngestStats, StatisticsSnapshot, TrendAnalysis};
use crate::scenario::ScenarioRun;

/// Latest snapshot of one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Reporting component.
    pub source_id: String,
    /// Metric name.
    pub metric_name: String,
    /// Statistics.
    pub snapshot: StatisticsSnapshot,
    /// Direction and confidence of the window's trend.
    pub trend: TrendAnalysis,
}

/// Everything `get_status` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Current or last scenario run.
    pub run: ScenarioRun,
    /// Per-stream snapshots, ordered by source then metric.
    pub snapshots: Vec<StreamSnapshot>,
    /// Most recent cross-stream aggregate.
    pub aggregated: Option<AggregatedMetrics>,
    /// Alerts within the retention horizon.
    pub alerts: Vec<Alert>,
    /// Baseline manager status.
    pub baseline: BaselineStatus,
    /// Registered components.
    pub components: Vec<ComponentSnapshot>,
    /// Ingestion totals.
    pub ingest: IngestStats,
    /// When the view was assembled.
    pub generated_at: DateTime<Utc>,
}

/// A baseline restored from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedBaseline {
    /// The installed baseline.
    pub baseline: ActiveBaselineSummary,
    /// Seconds since it was captured.
    pub age_secs: i64,
    /// Manager status after installation.
    pub status: BaselineStatus,
}
