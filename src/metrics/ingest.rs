//! Heterogeneous report ingestion.
//!
//! Each component type reports its own JSON shape. [`ComponentKind`] is the
//! closed set of adapters turning a report payload into normalized
//! [`MetricSample`]s; the [`Ingestor`] deduplicates them through the
//! statistics engine and forwards fresh samples to an optional tap (the
//! baseline manager) without waiting on it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ValidationError;

use super::engine::RollingStatisticsEngine;
use super::sample::{MetricSample, Unit};
use super::window::RecordOutcome;

/// Component type, selecting the report adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// CPU pressure generator.
    Cpu,
    /// Memory pressure generator.
    Memory,
    /// Message publisher.
    Publisher,
    /// Message subscriber.
    Subscriber,
    /// Host-level system monitor.
    System,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
            Self::System => "system",
        };
        f.write_str(s)
    }
}

fn number(payload: &Value, path: &[&str]) -> Option<f64> {
    let mut node = payload;
    for segment in path {
        node = node.get(segment)?;
    }
    node.as_f64().filter(|v| v.is_finite())
}

impl ComponentKind {
    /// Map a report payload to `(metric_name, value, unit)` triples.
    ///
    /// Missing or non-numeric fields are skipped.
    #[must_use]
    pub fn adapt(self, payload: &Value) -> Vec<(&'static str, f64, Unit)> {
        let fields: &[(&'static str, &str, Unit)] = match self {
            Self::Cpu => &[
                ("cpu_percent", "cpu_percent", Unit::Percent),
                ("active_processes", "active_processes", Unit::Count),
                ("num_processes", "num_processes", Unit::Count),
            ],
            Self::Memory => &[
                ("process_memory_mb", "process_memory_mb", Unit::Megabytes),
                ("total_allocated_mb", "total_allocated_mb", Unit::Megabytes),
                ("memory_percent", "system_memory_percent", Unit::Percent),
                ("system_available_mb", "system_available_mb", Unit::Megabytes),
            ],
            Self::Publisher => &[
                ("message_count", "message_count", Unit::Count),
                ("average_rate", "average_rate", Unit::Hertz),
                ("target_rate", "target_rate", Unit::Hertz),
            ],
            Self::Subscriber => &[
                ("message_count", "message_count", Unit::Count),
                ("lost_messages", "lost_messages", Unit::Count),
                ("duplicate_messages", "duplicate_messages", Unit::Count),
                ("average_rate", "average_rate", Unit::Hertz),
                ("total_bytes", "total_bytes", Unit::Bytes),
            ],
            Self::System => &[
                ("cpu_percent", "cpu_percent", Unit::Percent),
                ("memory_percent", "memory_percent", Unit::Percent),
            ],
        };

        let mut out: Vec<_> = fields
            .iter()
            .filter_map(|(name, field, unit)| number(payload, &[*field]).map(|v| (*name, v, *unit)))
            .collect();

        if self == Self::Subscriber {
            // Latency statistics arrive in seconds.
            if let Some(mean_s) = number(payload, &["latency", "mean"]) {
                out.push(("latency_ms", mean_s * 1000.0, Unit::Milliseconds));
            }
            let received = number(payload, &["message_count"]);
            let lost = number(payload, &["lost_messages"]);
            if let (Some(received), Some(lost)) = (received, lost) {
                let total = received + lost;
                if total > 0.0 {
                    out.push(("loss_rate", lost / total, Unit::Ratio));
                }
            }
        }
        out
    }
}

/// A raw report from one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    /// Reporting component.
    pub source_id: String,
    /// Component type.
    pub kind: ComponentKind,
    /// Per-source report sequence number.
    pub sequence: u64,
    /// Measurement time; defaults to arrival time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Component-specific payload.
    pub payload: Value,
}

/// Result of ingesting one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Samples recorded.
    pub accepted: usize,
    /// Samples skipped as duplicates.
    pub duplicates: usize,
    /// Samples recorded out of sequence order.
    pub reordered: usize,
    /// Whether the source was seen for the first time.
    pub new_source: bool,
}

/// A registered metric source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Component type.
    pub kind: ComponentKind,
    /// When the first report arrived.
    pub first_seen: DateTime<Utc>,
}

/// Running ingestion totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Reports processed.
    pub reports: u64,
    /// Samples recorded.
    pub accepted: u64,
    /// Duplicates skipped.
    pub duplicates: u64,
    /// Out-of-order samples.
    pub reordered: u64,
    /// Registered sources.
    pub sources: usize,
}

/// One-directional sample feed for a consumer such as the baseline manager.
///
/// Forwarding is skipped while the consumer is inactive and never blocks.
#[derive(Debug, Clone)]
pub struct SampleTap {
    tx: mpsc::UnboundedSender<MetricSample>,
    active: Arc<AtomicBool>,
}

impl SampleTap {
    /// Create a tap and its receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MetricSample>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx,
                active: Arc::clone(&active),
            },
            rx,
            active,
        )
    }

    fn forward(&self, sample: &MetricSample) {
        if self.active.load(Ordering::Acquire) && self.tx.send(sample.clone()).is_err() {
            tracing::warn!("Sample tap receiver dropped");
        }
    }
}

/// Report ingestor.
#[derive(Debug)]
pub struct Ingestor {
    engine: Arc<RollingStatisticsEngine>,
    tap: Option<SampleTap>,
    sources: RwLock<BTreeMap<String, SourceInfo>>,
    reports: AtomicU64,
    accepted: AtomicU64,
    duplicates: AtomicU64,
    reordered: AtomicU64,
}

impl Ingestor {
    /// Create an ingestor feeding `engine`.
    #[must_use]
    pub fn new(engine: Arc<RollingStatisticsEngine>) -> Self {
        Self {
            engine,
            tap: None,
            sources: RwLock::new(BTreeMap::new()),
            reports: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            reordered: AtomicU64::new(0),
        }
    }

    /// Forward fresh samples to `tap` as well.
    #[must_use]
    pub fn with_tap(mut self, tap: SampleTap) -> Self {
        self.tap = Some(tap);
        self
    }

    /// The statistics engine this ingestor feeds.
    #[must_use]
    pub const fn engine(&self) -> &Arc<RollingStatisticsEngine> {
        &self.engine
    }

    /// Register `source_id` if unknown; returns whether it was new.
    ///
    /// The directory is append-only.
    pub fn register_source(&self, source_id: &str, kind: ComponentKind) -> bool {
        let mut sources = match self.sources.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Source directory lock poisoned, using recovered data");
                poisoned.into_inner()
            }
        };
        if sources.contains_key(source_id) {
            return false;
        }
        sources.insert(
            source_id.to_string(),
            SourceInfo {
                kind,
                first_seen: Utc::now(),
            },
        );
        tracing::info!(source = source_id, kind = %kind, "Registered metric source");
        true
    }

    /// Ingest one raw report.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedReport`] if the source id is empty
    /// or the payload is not a JSON object.
    pub fn ingest(&self, report: &RawReport) -> Result<IngestOutcome, ValidationError> {
        if report.source_id.trim().is_empty() {
            return Err(ValidationError::MalformedReport {
                source_id: report.source_id.clone(),
                reason: "empty source id".into(),
            });
        }
        if !report.payload.is_object() {
            return Err(ValidationError::MalformedReport {
                source_id: report.source_id.clone(),
                reason: "payload must be a JSON object".into(),
            });
        }

        self.reports.fetch_add(1, Ordering::Relaxed);
        let new_source = self.register_source(&report.source_id, report.kind);
        let timestamp = report.timestamp.unwrap_or_else(Utc::now);

        let mut outcome = IngestOutcome {
            new_source,
            ..IngestOutcome::default()
        };
        for (name, value, unit) in report.kind.adapt(&report.payload) {
            let sample = MetricSample::new(&report.source_id, name, value, unit, report.sequence)
                .at(timestamp);
            self.accumulate(&mut outcome, &sample);
        }

        tracing::debug!(
            source = %report.source_id,
            sequence = report.sequence,
            accepted = outcome.accepted,
            duplicates = outcome.duplicates,
            "Ingested report"
        );
        Ok(outcome)
    }

    /// Ingest an already-normalized sample.
    ///
    /// Unknown sources are registered as [`ComponentKind::System`].
    pub fn ingest_sample(&self, sample: &MetricSample) -> IngestOutcome {
        let mut outcome = IngestOutcome {
            new_source: self.register_source(&sample.source_id, ComponentKind::System),
            ..IngestOutcome::default()
        };
        if sample.value.is_finite() {
            self.accumulate(&mut outcome, sample);
        }
        outcome
    }

    fn accumulate(&self, outcome: &mut IngestOutcome, sample: &MetricSample) {
        match self.engine.record(sample) {
            RecordOutcome::Duplicate => {
                outcome.duplicates += 1;
                self.duplicates.fetch_add(1, Ordering::Relaxed);
            }
            RecordOutcome::Recorded { reordered, .. } => {
                outcome.accepted += 1;
                self.accepted.fetch_add(1, Ordering::Relaxed);
                if reordered {
                    outcome.reordered += 1;
                    self.reordered.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(tap) = &self.tap {
                    tap.forward(sample);
                }
            }
        }
    }

    /// Snapshot of the source directory.
    #[must_use]
    pub fn sources(&self) -> BTreeMap<String, SourceInfo> {
        match self.sources.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Running totals.
    #[must_use]
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            reports: self.reports.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            reordered: self.reordered.load(Ordering::Relaxed),
            sources: self.sources().len(),
        }
    }
}
