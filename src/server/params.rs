//! Tool parameter types.
//!
//! Each struct derives `JsonSchema` so rmcp can publish the input schema.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::control::ComponentRole;
use crate::error::ValidationError;
use crate::metrics::{ComponentKind, RawReport};

/// Parameters for `start_scenario`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StartScenarioParams {
    /// Scenario name as listed by `list_scenarios`.
    #[schemars(description = "Scenario name, e.g. cpu_stress")]
    pub name: String,
}

/// Parameters for `start_baseline`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StartBaselineParams {
    /// Capture length in seconds; defaults to the configured duration.
    #[schemars(range(min = 1, max = 3600))]
    #[schemars(description = "Capture length in seconds (default from BASELINE_DURATION_SECS)")]
    pub duration_secs: Option<u64>,
}

/// Parameters for `load_baseline`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LoadBaselineParams {
    /// Baseline to restore; the most recently saved one when omitted.
    #[schemars(description = "Baseline id (default: latest saved)")]
    pub baseline_id: Option<String>,
}

/// Parameters for `baseline_history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BaselineHistoryParams {
    /// Maximum rows.
    #[schemars(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

/// Component type of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// CPU pressure generator.
    Cpu,
    /// Memory pressure generator.
    Memory,
    /// Message publisher.
    Publisher,
    /// Message subscriber.
    Subscriber,
    /// Host-level monitor.
    System,
}

impl From<ReportKind> for ComponentKind {
    fn from(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Cpu => Self::Cpu,
            ReportKind::Memory => Self::Memory,
            ReportKind::Publisher => Self::Publisher,
            ReportKind::Subscriber => Self::Subscriber,
            ReportKind::System => Self::System,
        }
    }
}

/// Parameters for `ingest_report`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestReportParams {
    /// Reporting component.
    pub source_id: String,
    /// Component type, selecting the payload adapter.
    pub kind: ReportKind,
    /// Per-source report sequence number; repeats are ignored.
    pub sequence: u64,
    /// RFC 3339 measurement time; arrival time when omitted.
    #[schemars(description = "RFC 3339 timestamp, e.g. 2024-05-01T12:00:00Z")]
    pub timestamp: Option<String>,
    /// Component-specific JSON object.
    #[schemars(description = "Report payload, e.g. {\"cpu_percent\": 42.5}")]
    pub payload: serde_json::Value,
}

impl IngestReportParams {
    /// Convert to a [`RawReport`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidParameter`] for an unparseable timestamp.
    pub fn into_report(self) -> Result<RawReport, ValidationError> {
        let timestamp = self
            .timestamp
            .as_deref()
            .map(|ts| {
                DateTime::parse_from_rfc3339(ts)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| ValidationError::InvalidParameter {
                        name: "timestamp".into(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;
        Ok(RawReport {
            source_id: self.source_id,
            kind: self.kind.into(),
            sequence: self.sequence,
            timestamp,
            payload: self.payload,
        })
    }
}

/// Parameters for `register_component`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterComponentParams {
    /// Component identifier.
    pub component_id: String,
    /// One of cpu, memory, publisher, subscriber, throughput.
    #[schemars(description = "cpu | memory | publisher | subscriber | throughput")]
    pub role: String,
}

impl RegisterComponentParams {
    /// Parsed role.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidParameter`] for an unknown role.
    pub fn role(&self) -> Result<ComponentRole, ValidationError> {
        self.role.parse()
    }
}

/// Parameters for `component_commands`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ComponentCommandsParams {
    /// Return commands with a sequence greater than this.
    #[serde(default)]
    pub after_sequence: u64,
    /// Only commands for this component.
    pub component_id: Option<String>,
}
