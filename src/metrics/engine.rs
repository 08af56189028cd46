//! Rolling statistics over all metric streams.
//!
//! Streams are created lazily on their first sample. Each stream sits
//! behind its own mutex so appends to one stream are serialized while
//! independent streams update in parallel; the outer map lock is only
//! held long enough to find or insert a stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::config::StatisticsConfig;

use super::sample::{MetricSample, StreamKey};
use super::stats::StatisticsSnapshot;
use super::window::{MetricWindow, RecordOutcome, WindowBounds};

type SharedWindow = Arc<Mutex<MetricWindow>>;

/// Rolling statistics engine.
///
/// # Example
///
/// ```
/// use stress_orchestrator::metrics::{MetricSample, RollingStatisticsEngine, Unit};
///
/// let engine = RollingStatisticsEngine::with_capacity(100);
/// for seq in 0..10 {
///     engine.record(&MetricSample::new("cpu-0", "cpu_percent", 40.0, Unit::Percent, seq));
/// }
/// let snapshot = engine.snapshot("cpu-0", "cpu_percent").unwrap();
/// assert_eq!(snapshot.count, 10);
/// assert!((snapshot.mean - 40.0).abs() < f64::EPSILON);
/// ```
#[derive(Debug)]
pub struct RollingStatisticsEngine {
    bounds: WindowBounds,
    streams: RwLock<HashMap<StreamKey, SharedWindow>>,
}

fn lock_window(window: &SharedWindow) -> MutexGuard<'_, MetricWindow> {
    match window.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("Metric window mutex poisoned, using recovered data");
            poisoned.into_inner()
        }
    }
}

impl RollingStatisticsEngine {
    /// Create an engine with explicit window bounds.
    #[must_use]
    pub fn new(bounds: WindowBounds) -> Self {
        Self {
            bounds,
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Create an engine bounded by capacity only.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(WindowBounds::capacity(capacity))
    }

    /// Create an engine from configuration.
    #[must_use]
    pub fn from_config(config: &StatisticsConfig) -> Self {
        Self::new(WindowBounds {
            capacity: config.window_capacity,
            horizon: config.window_horizon(),
        })
    }

    fn stream(&self, key: &StreamKey) -> Option<SharedWindow> {
        let streams = match self.streams.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Stream map lock poisoned, using recovered data");
                poisoned.into_inner()
            }
        };
        streams.get(key).cloned()
    }

    fn stream_or_create(&self, sample: &MetricSample) -> SharedWindow {
        let key = sample.stream_key();
        if let Some(window) = self.stream(&key) {
            return window;
        }
        let mut streams = match self.streams.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Stream map lock poisoned, using recovered data");
                poisoned.into_inner()
            }
        };
        Arc::clone(streams.entry(key).or_insert_with(|| {
            tracing::debug!(
                source = %sample.source_id,
                metric = %sample.metric_name,
                "Created metric stream"
            );
            Arc::new(Mutex::new(MetricWindow::new(self.bounds, sample.unit)))
        }))
    }

    /// Append a sample to its stream.
    pub fn record(&self, sample: &MetricSample) -> RecordOutcome {
        let window = self.stream_or_create(sample);
        let outcome = lock_window(&window).record(sample);
        outcome
    }

    /// Current snapshot of one stream.
    #[must_use]
    pub fn snapshot(&self, source_id: &str, metric_name: &str) -> Option<StatisticsSnapshot> {
        let window = self.stream(&StreamKey::new(source_id, metric_name))?;
        let snapshot = lock_window(&window).snapshot();
        snapshot
    }

    /// Snapshots of every non-empty stream, ordered by key.
    #[must_use]
    pub fn snapshots(&self) -> Vec<(StreamKey, StatisticsSnapshot)> {
        self.revisioned_snapshots()
            .into_iter()
            .map(|(key, _, snapshot)| (key, snapshot))
            .collect()
    }

    /// Like [`snapshots`](Self::snapshots), with each stream's revision so
    /// callers can tell which snapshots are new since their last look.
    #[must_use]
    pub fn revisioned_snapshots(&self) -> Vec<(StreamKey, u64, StatisticsSnapshot)> {
        let streams: Vec<(StreamKey, SharedWindow)> = {
            let guard = match self.streams.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard
                .iter()
                .map(|(k, w)| (k.clone(), Arc::clone(w)))
                .collect()
        };
        let mut out: Vec<_> = streams
            .into_iter()
            .filter_map(|(key, window)| {
                let window = lock_window(&window);
                let snapshot = window.snapshot()?;
                Some((key, window.revision(), snapshot))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Number of streams.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        match self.streams.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Drop every stream; used when a session ends.
    pub fn clear(&self) {
        match self.streams.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::sample::Unit;
    use proptest::prelude::*;

    fn sample(source: &str, seq: u64, value: f64) -> MetricSample {
        MetricSample::new(source, "latency_ms", value, Unit::Milliseconds, seq)
    }

    #[test]
    fn test_streams_created_lazily() {
        let engine = RollingStatisticsEngine::with_capacity(10);
        assert_eq!(engine.stream_count(), 0);
        assert!(engine.snapshot("a", "latency_ms").is_none());
        engine.record(&sample("a", 0, 1.0));
        engine.record(&sample("b", 0, 1.0));
        assert_eq!(engine.stream_count(), 2);
        assert_eq!(engine.snapshots().len(), 2);
    }

    #[test]
    fn test_revision_moves_only_on_recorded_samples() {
        let engine = RollingStatisticsEngine::with_capacity(10);
        engine.record(&sample("a", 0, 1.0));
        engine.record(&sample("a", 1, 2.0));
        assert_eq!(engine.revisioned_snapshots()[0].1, 2);

        engine.record(&sample("a", 1, 5.0));
        let (key, revision, snapshot) = engine.revisioned_snapshots().remove(0);
        assert_eq!(key, StreamKey::new("a", "latency_ms"));
        assert_eq!(revision, 2);
        assert_eq!(snapshot.count, 2);
    }

    #[test]
    fn test_clear_drops_streams() {
        let engine = RollingStatisticsEngine::with_capacity(10);
        engine.record(&sample("a", 0, 1.0));
        engine.clear();
        assert_eq!(engine.stream_count(), 0);
    }

    #[test]
    fn test_parallel_streams_do_not_interfere() {
        let engine = Arc::new(RollingStatisticsEngine::with_capacity(10_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for seq in 0..500 {
                        engine.record(&sample(&format!("src-{t}"), seq, 1.0));
                        engine.record(&sample("shared", t * 1000 + seq, 2.0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for t in 0..4 {
            assert_eq!(engine.snapshot(&format!("src-{t}"), "latency_ms").unwrap().count, 500);
        }
        assert_eq!(engine.snapshot("shared", "latency_ms").unwrap().count, 2000);
    }

    proptest! {
        #[test]
        fn prop_count_matches_window_regardless_of_order(
            seqs in proptest::collection::hash_set(0u64..10_000, 1..200),
            capacity in 1usize..300,
        ) {
            let engine = RollingStatisticsEngine::with_capacity(capacity);
            let seqs: Vec<u64> = seqs.into_iter().collect();
            for seq in &seqs {
                engine.record(&sample("s", *seq, *seq as f64));
            }
            let snap = engine.snapshot("s", "latency_ms").unwrap();
            prop_assert_eq!(snap.count, seqs.len().min(capacity));
        }

        #[test]
        fn prop_reingest_never_changes_snapshot(
            values in proptest::collection::vec(0.0f64..1000.0, 1..100),
            replay in proptest::collection::vec(any::<prop::sample::Index>(), 1..50),
        ) {
            let engine = RollingStatisticsEngine::with_capacity(64);
            for (seq, value) in values.iter().enumerate() {
                engine.record(&sample("s", seq as u64, *value));
            }
            let before = engine.snapshot("s", "latency_ms").unwrap();
            for idx in replay {
                let seq = idx.index(values.len());
                let outcome = engine.record(&sample("s", seq as u64, values[seq] + 1.0));
                prop_assert_eq!(outcome, RecordOutcome::Duplicate);
            }
            let after = engine.snapshot("s", "latency_ms").unwrap();
            prop_assert_eq!(before.count, after.count);
            prop_assert_eq!(before.mean.to_bits(), after.mean.to_bits());
            prop_assert_eq!(before.percentiles, after.percentiles);
            prop_assert_eq!(before.trend_slope.to_bits(), after.trend_slope.to_bits());
        }
    }
}
