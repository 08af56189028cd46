//! Sample accumulation during a capture.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::metrics::{MetricSample, StatisticsSnapshot, Unit};

#[derive(Debug, Clone)]
struct MetricBuffer {
    unit: Unit,
    points: Vec<(DateTime<Utc>, f64)>,
}

/// Per-metric sample buffer, pooled across sources.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    metrics: BTreeMap<String, MetricBuffer>,
    samples: usize,
}

impl CaptureBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample.
    pub fn push(&mut self, sample: &MetricSample) {
        if !sample.value.is_finite() {
            return;
        }
        self.metrics
            .entry(sample.metric_name.clone())
            .or_insert_with(|| MetricBuffer {
                unit: sample.unit,
                points: Vec::new(),
            })
            .points
            .push((sample.timestamp, sample.value));
        self.samples += 1;
    }

    /// Samples buffered.
    #[must_use]
    pub const fn sample_count(&self) -> usize {
        self.samples
    }

    /// Snapshot every buffered metric.
    #[must_use]
    pub fn finish(self) -> BTreeMap<String, StatisticsSnapshot> {
        self.metrics
            .into_iter()
            .filter_map(|(name, mut buffer)| {
                buffer.points.sort_by_key(|(ts, _)| *ts);
                let mut sorted: Vec<f64> = buffer.points.iter().map(|(_, v)| *v).collect();
                sorted.sort_by(f64::total_cmp);
                StatisticsSnapshot::compute(&sorted, &buffer.points, buffer.unit).map(|s| (name, s))
            })
            .collect()
    }
}
