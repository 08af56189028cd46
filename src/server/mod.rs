//! MCP server implementation.
//!
//! This module provides:
//! - [`StressServer`]: the rmcp tool router over the [`Orchestrator`](crate::orchestrator::Orchestrator)
//! - [`McpServer`]: stdio transport, signal handling and shutdown
//! - Parameter types with JSON schemas
//!
//! # Tools
//!
//! - **Scenarios**: `start_scenario`, `stop_scenario`, `list_scenarios`, `get_status`
//! - **Baselines**: `start_baseline`, `validate_idle`, `cancel_baseline`, `save_baseline`,
//!   `load_baseline`, `baseline_history`
//! - **Components**: `ingest_report`, `register_component`, `component_commands`

mod mcp;
mod params;
mod tools;

pub use mcp::McpServer;
pub use params::{
    BaselineHistoryParams, ComponentCommandsParams, IngestReportParams, LoadBaselineParams,
    RegisterComponentParams, ReportKind, StartBaselineParams, StartScenarioParams,
};
pub use tools::StressServer;
