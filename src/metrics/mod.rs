//! Metric ingestion and rolling statistics.
//!
//! This module provides:
//! - [`MetricSample`]: the normalized sample shared by all stages
//! - [`Ingestor`]: per-component-type report adapters, dedup and fan-out
//! - [`RollingStatisticsEngine`]: bounded per-stream windows and snapshots
//! - [`RegressionDetector`]: sustained degradation against a trailing reference
//! - [`AggregatedMetrics`]: cross-stream totals
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use stress_orchestrator::metrics::{ComponentKind, Ingestor, RawReport, RollingStatisticsEngine};
//!
//! let engine = Arc::new(RollingStatisticsEngine::with_capacity(256));
//! let ingestor = Ingestor::new(Arc::clone(&engine));
//!
//! let report = RawReport {
//!     source_id: "sub-0".into(),
//!     kind: ComponentKind::Subscriber,
//!     sequence: 1,
//!     timestamp: None,
//!     payload: json!({"message_count": 95, "lost_messages": 5, "latency": {"mean": 0.004}}),
//! };
//! let outcome = ingestor.ingest(&report).unwrap();
//! assert_eq!(outcome.accepted, 4);
//!
//! // Replaying the same report is counted, not recorded.
//! let replay = ingestor.ingest(&report).unwrap();
//! assert_eq!(replay.duplicates, 4);
//! assert_eq!(engine.snapshot("sub-0", "loss_rate").unwrap().count, 1);
//! ```

mod aggregate;
mod engine;
mod ingest;
mod regression;
mod sample;
mod stats;
mod trend;
mod window;

pub use aggregate::AggregatedMetrics;
pub use engine::RollingStatisticsEngine;
pub use ingest::{
    ComponentKind, IngestOutcome, IngestStats, Ingestor, RawReport, SampleTap, SourceInfo,
};
pub use regression::{RegressionDetector, RegressionSignal, SustainGate};
pub use sample::{MetricSample, StreamKey, Unit};
pub use stats::{least_squares_slope, percentile, stability_score, Percentiles, StatisticsSnapshot};
pub use trend::{MetricPolarity, TrendAnalysis, TrendDirection, STABLE_SLOPE};
pub use window::{MetricWindow, RecordOutcome, WindowBounds, DEDUP_HORIZON};
