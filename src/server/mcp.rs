//! Main MCP server orchestration.
//!
//! Builds the [`Orchestrator`], serves it over stdio and tears everything
//! down on disconnect, ctrl-c or SIGTERM.

use std::sync::Arc;

use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, McpError};
use crate::orchestrator::Orchestrator;

use super::tools::StressServer;

/// Main MCP server.
#[derive(Debug)]
pub struct McpServer {
    config: Config,
}

impl McpServer {
    /// Creates a new MCP server with the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the server over stdin/stdout until the client disconnects or a
    /// shutdown signal arrives. A running scenario is aborted and its
    /// components stopped before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or database cannot be loaded, or the
    /// MCP handshake fails.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run_stdio(&self) -> Result<(), AppError> {
        let orchestrator = Arc::new(Orchestrator::from_config(self.config.clone()).await?);
        let server = StressServer::new(Arc::clone(&orchestrator));

        let running = server.serve(stdio()).await.map_err(|e| McpError::Transport {
            message: e.to_string(),
        })?;

        tokio::select! {
            result = running.waiting() => match result {
                Ok(reason) => info!(?reason, "Client disconnected"),
                Err(e) => warn!(error = %e, "MCP service ended with an error"),
            },
            () = shutdown_signal() => {}
        }

        orchestrator.shutdown().await;
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received ctrl-c, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_server_config_accessor() {
        let mut config = Config::default();
        config.database_path = "/tmp/test.db".to_string();
        config.control.max_retries = 5;
        let server = McpServer::new(config);
        assert_eq!(server.config().database_path, "/tmp/test.db");
        assert_eq!(server.config().control.max_retries, 5);
        assert!(format!("{server:?}").contains("McpServer"));
    }
}
