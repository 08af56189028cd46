//! Tool definitions with rmcp macros.
//!
//! Every tool is a thin adapter over [`Orchestrator`]. Domain failures
//! (unknown scenario, no baseline, ...) come back as tool errors carrying a
//! JSON body; protocol-level problems are [`McpError`]s.

use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;
use serde_json::json;

use crate::orchestrator::Orchestrator;

use super::params::{
    BaselineHistoryParams, ComponentCommandsParams, IngestReportParams, LoadBaselineParams,
    RegisterComponentParams, StartBaselineParams, StartScenarioParams,
};

const DEFAULT_HISTORY_LIMIT: u32 = 20;

const INSTRUCTIONS: &str = "Stress test orchestrator. Use list_scenarios to see scenarios, \
start_baseline to capture an idle reference, start_scenario to run one, and get_status to \
follow progress, metric snapshots and alerts. Components report metrics through \
ingest_report and pull their commands through component_commands.";

fn success<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::json(value)?]))
}

fn failure(error: &impl std::fmt::Display) -> Result<CallToolResult, McpError> {
    tracing::debug!(error = %error, "Tool call failed");
    Ok(CallToolResult::error(vec![Content::json(json!({
        "error": error.to_string(),
    }))?]))
}

/// MCP server exposing the orchestrator.
#[derive(Clone)]
pub struct StressServer {
    orchestrator: Arc<Orchestrator>,
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for StressServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StressServer")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[tool_router]
impl StressServer {
    /// Create a server over `orchestrator`.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Start a scenario by name. Returns immediately once the scenario is accepted; follow progress with get_status.")]
    async fn start_scenario(
        &self,
        Parameters(params): Parameters<StartScenarioParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.orchestrator.start_scenario(&params.name).await {
            Ok(run) => success(&run),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "Abort the running scenario and stop every component it modified.")]
    async fn stop_scenario(&self) -> Result<CallToolResult, McpError> {
        match self.orchestrator.stop_scenario().await {
            Ok(run) => success(&run),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "List available scenarios with their phases and total duration.")]
    async fn list_scenarios(&self) -> Result<CallToolResult, McpError> {
        success(&self.orchestrator.list_scenarios())
    }

    #[tool(description = "Current scenario run, latest per-metric statistics, active alerts, baseline status and components.")]
    async fn get_status(&self) -> Result<CallToolResult, McpError> {
        success(&self.orchestrator.get_status())
    }

    #[tool(description = "Start a baseline capture on a quiet system (idle validation runs first when enabled).")]
    async fn start_baseline(
        &self,
        Parameters(params): Parameters<StartBaselineParams>,
    ) -> Result<CallToolResult, McpError> {
        let duration = params.duration_secs.map(Duration::from_secs);
        match self.orchestrator.start_baseline(duration).await {
            Ok(status) => success(&status),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "Check that CPU and memory are quiet enough for a baseline, without capturing one.")]
    async fn validate_idle(&self) -> Result<CallToolResult, McpError> {
        match self.orchestrator.validate_idle().await {
            Ok(status) => success(&status),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "Cancel a running idle validation or baseline capture.")]
    async fn cancel_baseline(&self) -> Result<CallToolResult, McpError> {
        match self.orchestrator.cancel_baseline().await {
            Ok(cancelled) => success(&json!({ "cancelled": cancelled })),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "Persist the active baseline so a later session can reuse it.")]
    async fn save_baseline(&self) -> Result<CallToolResult, McpError> {
        match self.orchestrator.save_baseline().await {
            Ok(stored) => success(&stored),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "Restore a saved baseline (by id, or the latest) and make it active. Reports its age.")]
    async fn load_baseline(
        &self,
        Parameters(params): Parameters<LoadBaselineParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.orchestrator.load_baseline(params.baseline_id.as_deref()).await {
            Ok(loaded) => success(&loaded),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "List saved baselines, newest first.")]
    async fn baseline_history(
        &self,
        Parameters(params): Parameters<BaselineHistoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
        match self.orchestrator.baseline_history(limit).await {
            Ok(rows) => success(&rows),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "Submit one metric report from a component. Duplicate sequence numbers are counted, not recorded.")]
    async fn ingest_report(
        &self,
        Parameters(params): Parameters<IngestReportParams>,
    ) -> Result<CallToolResult, McpError> {
        let report = params
            .into_report()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        match self.orchestrator.ingest(&report) {
            Ok(outcome) => success(&outcome),
            Err(e) => failure(&e),
        }
    }

    #[tool(description = "Register a stress component under a role; it receives commands through component_commands.")]
    async fn register_component(
        &self,
        Parameters(params): Parameters<RegisterComponentParams>,
    ) -> Result<CallToolResult, McpError> {
        let role = params
            .role()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        let replaced = self.orchestrator.register_component(&params.component_id, role);
        success(&json!({
            "component_id": params.component_id,
            "role": role,
            "replaced": replaced,
        }))
    }

    #[tool(description = "Commands published to components after a sequence number, optionally for one component.")]
    async fn component_commands(
        &self,
        Parameters(params): Parameters<ComponentCommandsParams>,
    ) -> Result<CallToolResult, McpError> {
        success(
            &self
                .orchestrator
                .component_commands(params.after_sequence, params.component_id.as_deref()),
        )
    }
}

#[tool_handler]
impl ServerHandler for StressServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.into()),
            ..Default::default()
        }
    }
}
