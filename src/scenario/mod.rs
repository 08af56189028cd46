//! Scenario definitions and execution.
//!
//! This module provides:
//! - [`ScenarioDefinition`] / [`PhaseSpec`]: declarative, validated scenarios
//! - [`ScenarioCatalog`]: built-in scenarios merged with an optional JSON file
//! - [`ScenarioEngine`] / [`ScenarioHandle`]: the run actor and its client
//! - [`ScenarioRun`] / [`ScenarioEvent`]: published run state and events

mod catalog;
mod definition;
mod engine;
mod run;

pub use catalog::ScenarioCatalog;
pub use definition::{PhaseSpec, PhaseSummary, ScenarioDefinition, ScenarioSummary};
pub use engine::{ScenarioCommand, ScenarioEngine, ScenarioHandle, PROGRESS_INTERVAL};
pub use run::{RunStatus, ScenarioEvent, ScenarioRun};
