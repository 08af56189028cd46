//! Orchestration facade and event fan-out.
//!
//! [`Orchestrator`] owns every subsystem and their background tasks:
//!
//! ```text
//! reports ──► Ingestor ──► RollingStatisticsEngine ──► Aggregator ──► alerts / aggregates
//!                 │                                        ▲
//!                 └──► BaselineManager ────────────────────┘ (comparison)
//!
//! commands ──► Orchestrator ──► ScenarioEngine ──► StressorControlProxy ──► components
//! ```
//!
//! Observers subscribe to the four [`EventBus`] channels: phase progress,
//! aggregated metrics, alerts and baseline status.

mod aggregation;
mod events;
mod facade;
mod status;

pub use aggregation::{Aggregator, AggregatorViews};
pub use events::{EventBus, EVENT_CAPACITY};
pub use facade::{Orchestrator, STOP_REASON};
pub use status::{LoadedBaseline, OrchestratorStatus, StreamSnapshot};
