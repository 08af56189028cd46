//! Stress Orchestrator
//!
//! Runs multi-phase stress scenarios against external load generators
//! (CPU, memory and message-traffic components), ingests their metric
//! reports, keeps rolling statistics per stream, captures and compares
//! baselines, and raises threshold and regression alerts. The whole system
//! is driven through an MCP stdio server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   stdin    ┌──────────────┐    commands    ┌──────────────┐
//! │ MCP client  │───────────▶│ Orchestrator │───────────────▶│  components  │
//! │             │◀───────────│   (Rust)     │◀───────────────│ (cpu/mem/..) │
//! └─────────────┘   stdout   └──────┬───────┘  metric reports└──────────────┘
//!                                   │
//!                                   ▼
//!                          SQLite (baselines)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stress_orchestrator::config::Config;
//! use stress_orchestrator::orchestrator::Orchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::from_config(Config::from_env()?).await?;
//! orchestrator.start_scenario("cpu_stress").await?;
//! println!("{:?}", orchestrator.get_status().run.status);
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod alerts;
pub mod baseline;
pub mod config;
pub mod control;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod scenario;
pub mod server;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_utils;
