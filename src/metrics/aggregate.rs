//! Cross-stream aggregate published on the aggregated-metrics channel.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ingest::{ComponentKind, SourceInfo};
use super::sample::StreamKey;
use super::stats::StatisticsSnapshot;

/// Totals across every stream at one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// When the aggregate was computed.
    pub timestamp: DateTime<Utc>,
    /// Sum of received message rates (Hz).
    pub total_message_rate: f64,
    /// Mean of per-subscriber mean latency.
    pub average_latency_ms: Option<f64>,
    /// Largest latency observed in any window.
    pub max_latency_ms: Option<f64>,
    /// Mean loss rate across subscribers.
    pub loss_rate: Option<f64>,
    /// Sources with at least one non-empty stream.
    pub active_sources: usize,
    /// Non-empty streams.
    pub stream_count: usize,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

impl AggregatedMetrics {
    /// Aggregate the given snapshots.
    ///
    /// Message rate counts subscribers (what was actually received); when
    /// no subscriber reports, publisher rates are used instead.
    #[must_use]
    pub fn from_snapshots(
        snapshots: &[(StreamKey, StatisticsSnapshot)],
        sources: &BTreeMap<String, SourceInfo>,
    ) -> Self {
        let kind_of = |key: &StreamKey| sources.get(&key.source_id).map(|s| s.kind);

        let rate_of = |kind: ComponentKind| -> Vec<f64> {
            snapshots
                .iter()
                .filter(|(k, _)| k.metric_name == "average_rate" && kind_of(k) == Some(kind))
                .map(|(_, s)| s.mean)
                .collect()
        };
        let mut rates = rate_of(ComponentKind::Subscriber);
        if rates.is_empty() {
            rates = rate_of(ComponentKind::Publisher);
        }

        let latency: Vec<&StatisticsSnapshot> = snapshots
            .iter()
            .filter(|(k, _)| k.metric_name == "latency_ms")
            .map(|(_, s)| s)
            .collect();
        let latency_means: Vec<f64> = latency.iter().map(|s| s.mean).collect();
        let loss: Vec<f64> = snapshots
            .iter()
            .filter(|(k, _)| k.metric_name == "loss_rate")
            .map(|(_, s)| s.mean)
            .collect();

        let active: BTreeSet<&str> = snapshots.iter().map(|(k, _)| k.source_id.as_str()).collect();

        Self {
            timestamp: Utc::now(),
            total_message_rate: rates.iter().sum(),
            average_latency_ms: mean(&latency_means),
            max_latency_ms: latency.iter().map(|s| s.max).reduce(f64::max),
            loss_rate: mean(&loss),
            active_sources: active.len(),
            stream_count: snapshots.len(),
        }
    }
}
