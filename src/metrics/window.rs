//! Bounded per-stream sample window.
//!
//! A window keeps samples in arrival order for FIFO eviction and a sorted
//! copy of the values for order statistics. Inserting into the sorted copy
//! is a binary search plus a shift, so recording is `O(window)` in the worst
//! case and a snapshot never re-sorts.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::sample::{MetricSample, Unit};
use super::stats::StatisticsSnapshot;

/// Distinct sequence numbers remembered per stream before the oldest are
/// folded into the watermark.
pub const DEDUP_HORIZON: usize = 4096;

/// Capacity and horizon bounds for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    /// Maximum number of samples.
    pub capacity: usize,
    /// Maximum age relative to the newest sample.
    pub horizon: Option<Duration>,
}

impl WindowBounds {
    /// Bounds limited by capacity only.
    #[must_use]
    pub const fn capacity(capacity: usize) -> Self {
        Self {
            capacity,
            horizon: None,
        }
    }

    /// Bounds that never evict.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::capacity(usize::MAX)
    }
}

/// Result of offering a sample to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The sample was appended.
    Recorded {
        /// The sequence number was lower than one already seen.
        reordered: bool,
        /// Samples evicted to respect the bounds.
        evicted: usize,
    },
    /// The sequence number was already recorded for this stream.
    Duplicate,
}

#[derive(Debug, Clone, Copy)]
struct TimedValue {
    value: f64,
    at: DateTime<Utc>,
}

/// Bounded memory of recorded sequence numbers.
///
/// The newest `limit` sequences are kept exactly. Older ones are folded into
/// a watermark, and anything at or below it counts as already recorded, so a
/// report delayed by more than `limit` newer reports is dropped.
#[derive(Debug, Clone)]
struct SequenceFilter {
    recent: BTreeSet<u64>,
    watermark: Option<u64>,
    limit: usize,
}

impl SequenceFilter {
    fn new(limit: usize) -> Self {
        Self {
            recent: BTreeSet::new(),
            watermark: None,
            limit: limit.max(1),
        }
    }

    /// Returns `false` if `sequence` was already recorded.
    fn insert(&mut self, sequence: u64) -> bool {
        if self.watermark.is_some_and(|w| sequence <= w) || !self.recent.insert(sequence) {
            return false;
        }
        while self.recent.len() > self.limit {
            self.watermark = self.recent.pop_first();
        }
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.recent.len()
    }
}

/// Ordered, bounded window of one metric stream.
#[derive(Debug, Clone)]
pub struct MetricWindow {
    bounds: WindowBounds,
    unit: Unit,
    arrivals: VecDeque<TimedValue>,
    sorted: Vec<f64>,
    seen: SequenceFilter,
    max_sequence: Option<u64>,
    newest: Option<DateTime<Utc>>,
    revision: u64,
}

impl MetricWindow {
    /// Create an empty window.
    #[must_use]
    pub fn new(bounds: WindowBounds, unit: Unit) -> Self {
        Self {
            bounds,
            unit,
            arrivals: VecDeque::new(),
            sorted: Vec::new(),
            seen: SequenceFilter::new(DEDUP_HORIZON),
            max_sequence: None,
            newest: None,
            revision: 0,
        }
    }

    /// Number of samples currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    /// Whether the window holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    /// Samples recorded over the window's lifetime; changes whenever the
    /// snapshot may have changed.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Unit of the stream.
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Append a sample, evicting as needed.
    ///
    /// A sequence number already seen for this stream is a no-op, even if
    /// the earlier sample has since been evicted. Only the last
    /// [`DEDUP_HORIZON`] sequences are tracked exactly; an older, never seen
    /// sequence is treated as a duplicate.
    pub fn record(&mut self, sample: &MetricSample) -> RecordOutcome {
        if !self.seen.insert(sample.sequence) {
            return RecordOutcome::Duplicate;
        }

        let reordered = self.max_sequence.is_some_and(|max| sample.sequence < max);
        self.max_sequence = Some(
            self.max_sequence
                .map_or(sample.sequence, |m| m.max(sample.sequence)),
        );
        self.newest = Some(
            self.newest
                .map_or(sample.timestamp, |n| n.max(sample.timestamp)),
        );

        self.arrivals.push_back(TimedValue {
            value: sample.value,
            at: sample.timestamp,
        });
        let idx = self.sorted.partition_point(|v| v.total_cmp(&sample.value).is_lt());
        self.sorted.insert(idx, sample.value);

        self.revision += 1;
        let evicted = self.evict();
        RecordOutcome::Recorded { reordered, evicted }
    }

    fn evict(&mut self) -> usize {
        let mut removed = Vec::new();

        if let (Some(horizon), Some(newest)) = (self.bounds.horizon, self.newest) {
            if let Ok(horizon) = chrono::Duration::from_std(horizon) {
                let cutoff = newest - horizon;
                self.arrivals.retain(|s| {
                    if s.at < cutoff {
                        removed.push(s.value);
                        false
                    } else {
                        true
                    }
                });
            }
        }

        while self.arrivals.len() > self.bounds.capacity {
            if let Some(oldest) = self.arrivals.pop_front() {
                removed.push(oldest.value);
            }
        }

        for value in &removed {
            let idx = self.sorted.partition_point(|v| v.total_cmp(value).is_lt());
            if idx < self.sorted.len() {
                self.sorted.remove(idx);
            }
        }
        removed.len()
    }

    /// Compute the current snapshot, or `None` for an empty window.
    #[must_use]
    pub fn snapshot(&self) -> Option<StatisticsSnapshot> {
        let points: Vec<(DateTime<Utc>, f64)> =
            self.arrivals.iter().map(|s| (s.at, s.value)).collect();
        StatisticsSnapshot::compute(&self.sorted, &points, self.unit)
    }

    /// Values in arrival order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.arrivals.iter().map(|s| s.value)
    }
}
