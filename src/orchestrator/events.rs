//! Event channels exposed to observers.

use tokio::sync::broadcast;

use crate::alerts::Alert;
use crate::baseline::BaselineStatus;
use crate::metrics::AggregatedMetrics;
use crate::scenario::ScenarioEvent;

/// Default per-channel buffer.
pub const EVENT_CAPACITY: usize = 256;

/// The four observer channels.
///
/// Publishing never blocks: a slow subscriber lags and skips events, it
/// never stalls the publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    progress: broadcast::Sender<ScenarioEvent>,
    aggregated: broadcast::Sender<AggregatedMetrics>,
    alerts: broadcast::Sender<Alert>,
    baseline: broadcast::Sender<BaselineStatus>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus whose channels buffer `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (progress, _) = broadcast::channel(capacity);
        let (aggregated, _) = broadcast::channel(capacity);
        let (alerts, _) = broadcast::channel(capacity);
        let (baseline, _) = broadcast::channel(capacity);
        Self {
            progress,
            aggregated,
            alerts,
            baseline,
        }
    }

    /// Sender for scenario events; handed to the scenario engine.
    #[must_use]
    pub fn progress_sender(&self) -> broadcast::Sender<ScenarioEvent> {
        self.progress.clone()
    }

    /// Publish an aggregate.
    pub fn publish_aggregated(&self, metrics: AggregatedMetrics) {
        let _ = self.aggregated.send(metrics);
    }

    /// Publish an alert.
    pub fn publish_alert(&self, alert: Alert) {
        let _ = self.alerts.send(alert);
    }

    /// Publish a baseline status change.
    pub fn publish_baseline(&self, status: BaselineStatus) {
        let _ = self.baseline.send(status);
    }

    /// Phase-progress channel.
    #[must_use]
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ScenarioEvent> {
        self.progress.subscribe()
    }

    /// Aggregated-metrics channel.
    #[must_use]
    pub fn subscribe_aggregated(&self) -> broadcast::Receiver<AggregatedMetrics> {
        self.aggregated.subscribe()
    }

    /// Alerts channel.
    #[must_use]
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    /// Baseline-status channel.
    #[must_use]
    pub fn subscribe_baseline(&self) -> broadcast::Receiver<BaselineStatus> {
        self.baseline.subscribe()
    }
}
