//! Periodic snapshot evaluation.
//!
//! Each pass takes the streams whose snapshot changed since the previous
//! pass and runs them through regression detection, baseline comparison and
//! the alert rules, then publishes a cross-stream aggregate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::alerts::{Alert, AlertEvaluator};
use crate::baseline::BaselineHandle;
use crate::config::Config;
use crate::error::BaselineError;
use crate::metrics::{AggregatedMetrics, Ingestor, RegressionDetector, StreamKey};

use super::events::EventBus;

/// Read side of the aggregator's latest results.
#[derive(Debug, Clone)]
pub struct AggregatorViews {
    /// Alerts within the retention horizon.
    pub alerts: watch::Receiver<Vec<Alert>>,
    /// Most recent aggregate.
    pub aggregated: watch::Receiver<Option<AggregatedMetrics>>,
}

/// Snapshot evaluation loop.
#[derive(Debug)]
pub struct Aggregator {
    ingestor: Arc<Ingestor>,
    baseline: BaselineHandle,
    detector: RegressionDetector,
    evaluator: AlertEvaluator,
    bus: EventBus,
    alerts_tx: watch::Sender<Vec<Alert>>,
    aggregated_tx: watch::Sender<Option<AggregatedMetrics>>,
    seen: HashMap<StreamKey, u64>,
    interval: Duration,
}

impl Aggregator {
    /// Create an aggregator over `ingestor`'s engine.
    #[must_use]
    pub fn new(
        config: &Config,
        ingestor: Arc<Ingestor>,
        baseline: BaselineHandle,
        bus: EventBus,
    ) -> (Self, AggregatorViews) {
        let (alerts_tx, alerts) = watch::channel(Vec::new());
        let (aggregated_tx, aggregated) = watch::channel(None);
        let aggregator = Self {
            ingestor,
            baseline,
            detector: RegressionDetector::from_config(&config.statistics),
            evaluator: AlertEvaluator::with_default_rules(&config.alerts, config.baseline.tolerance_pct),
            bus,
            alerts_tx,
            aggregated_tx,
            seen: HashMap::new(),
            interval: Duration::from_millis(config.statistics.aggregation_interval_ms.max(1)),
        };
        (aggregator, AggregatorViews { alerts, aggregated })
    }

    /// Evaluate every changed stream once; returns the alerts raised.
    pub fn evaluate(&mut self) -> Vec<Alert> {
        let snapshots = self.ingestor.engine().revisioned_snapshots();
        let mut raised = Vec::new();

        for (key, revision, snapshot) in &snapshots {
            if self.seen.get(key) == Some(revision) {
                continue;
            }
            self.seen.insert(key.clone(), *revision);

            raised.extend(self.evaluator.evaluate_snapshot(key, snapshot));
            if let Some(signal) = self.detector.evaluate(key, snapshot) {
                raised.extend(self.evaluator.evaluate_regression(&signal));
            }
            match self.baseline.compare(snapshot, &key.metric_name) {
                Ok(comparison) => {
                    raised.extend(self.evaluator.evaluate_comparison(Some(&key.source_id), &comparison));
                }
                Err(BaselineError::NoBaseline | BaselineError::MetricNotCaptured { .. }) => {}
                Err(e) => debug!(stream = %key, error = %e, "Baseline comparison skipped"),
            }
        }

        for alert in &raised {
            self.bus.publish_alert(alert.clone());
        }
        self.alerts_tx.send_replace(self.evaluator.active());

        if !snapshots.is_empty() {
            let plain: Vec<_> = snapshots.into_iter().map(|(k, _, s)| (k, s)).collect();
            let aggregated = AggregatedMetrics::from_snapshots(&plain, &self.ingestor.sources());
            self.bus.publish_aggregated(aggregated.clone());
            self.aggregated_tx.send_replace(Some(aggregated));
        }
        raised
    }

    /// Run until shutdown.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            rules = self.evaluator.rules().len(),
            "Aggregation loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let raised = self.evaluate();
                    if !raised.is_empty() {
                        debug!(count = raised.len(), "Alerts raised");
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            raised = self.evaluator.stats().raised,
            suppressed = self.evaluator.stats().suppressed,
            "Aggregation loop stopped"
        );
    }
}
