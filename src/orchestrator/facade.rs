//! The orchestration facade.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alerts::Alert;
use crate::baseline::{ActiveBaselineSummary, BaselineHandle, BaselineManager, BaselineStatus};
use crate::config::Config;
use crate::control::{
    BroadcastStressor, CommandTopic, ComponentCommand, ComponentRegistry, ComponentRole,
    ComponentSnapshot, StressorControlProxy,
};
use crate::error::{AppError, BaselineError, ScenarioError, ValidationError};
use crate::metrics::{
    AggregatedMetrics, IngestOutcome, Ingestor, RawReport, RollingStatisticsEngine, SampleTap,
};
use crate::scenario::{ScenarioCatalog, ScenarioEngine, ScenarioEvent, ScenarioHandle, ScenarioRun, ScenarioSummary};
use crate::storage::SqliteBaselineStore;
use crate::traits::{BaselineStore, StoredBaseline};

use super::aggregation::{Aggregator, AggregatorViews};
use super::events::EventBus;
use super::status::{LoadedBaseline, OrchestratorStatus, StreamSnapshot};

/// Reason recorded on runs stopped through the facade.
pub const STOP_REASON: &str = "stopped by request";

/// Single entry point for control and observation.
///
/// Every call returns promptly: long-running work (scenario phases,
/// baseline captures) happens in background tasks and is observed through
/// [`get_status`](Self::get_status) or the event channels.
pub struct Orchestrator {
    config: Arc<Config>,
    ingestor: Arc<Ingestor>,
    registry: Arc<ComponentRegistry>,
    topic: Arc<CommandTopic>,
    baseline: BaselineHandle,
    scenarios: ScenarioHandle,
    store: Arc<dyn BaselineStore>,
    bus: EventBus,
    views: AggregatorViews,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("components", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Open the baseline database, load the scenario catalog and start.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an unreadable or invalid
    /// catalog, or [`AppError::Storage`] if the database cannot be opened.
    pub async fn from_config(config: Config) -> Result<Self, AppError> {
        let limit = Duration::from_secs(config.scenario.max_scenario_duration_secs);
        let catalog = ScenarioCatalog::load(config.scenarios_path.as_deref().map(Path::new), limit)?;
        let store = SqliteBaselineStore::new(&config.database_path).await?;
        Ok(Self::start(config, catalog, Arc::new(store)))
    }

    /// Wire the subsystems together and spawn their tasks.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(config: Config, catalog: ScenarioCatalog, store: Arc<dyn BaselineStore>) -> Self {
        let config = Arc::new(config);
        let bus = EventBus::default();

        let engine = Arc::new(RollingStatisticsEngine::from_config(&config.statistics));
        let (tap, samples_rx, tap_active) = SampleTap::channel();
        let ingestor = Arc::new(Ingestor::new(engine).with_tap(tap));

        let (manager, baseline) = BaselineManager::new(config.baseline.clone(), samples_rx, tap_active);
        let registry = Arc::new(ComponentRegistry::new());
        let (scenario_engine, scenarios) = ScenarioEngine::new(
            config.scenario.clone(),
            Arc::new(catalog),
            Arc::clone(&registry),
            baseline.clone(),
            bus.progress_sender(),
        );
        let (aggregator, views) =
            Aggregator::new(&config, Arc::clone(&ingestor), baseline.clone(), bus.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(manager.run(shutdown_rx.clone())),
            tokio::spawn(scenario_engine.run(shutdown_rx.clone())),
            tokio::spawn(aggregator.run(shutdown_rx.clone())),
            tokio::spawn(forward_baseline_status(baseline.subscribe(), bus.clone(), shutdown_rx)),
        ];

        info!(
            scenarios = scenarios.catalog().len(),
            policy = %config.scenario.baseline_policy,
            "Orchestrator started"
        );

        Self {
            config,
            ingestor,
            registry,
            topic: Arc::new(CommandTopic::default()),
            baseline,
            scenarios,
            store,
            bus,
            views,
            shutdown_tx,
            tasks: Mutex::new(tasks),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    /// Validate and schedule a scenario; returns once it is accepted.
    ///
    /// # Errors
    ///
    /// See [`ScenarioHandle::start`].
    pub async fn start_scenario(&self, name: &str) -> Result<ScenarioRun, ScenarioError> {
        self.scenarios.start(name).await
    }

    /// Abort the running scenario and stop the components it modified.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::NotRunning`] if nothing is active.
    pub async fn stop_scenario(&self) -> Result<ScenarioRun, ScenarioError> {
        self.scenarios.abort(STOP_REASON).await
    }

    /// Registered scenarios.
    #[must_use]
    pub fn list_scenarios(&self) -> Vec<ScenarioSummary> {
        self.scenarios.list()
    }

    /// Run state, per-stream snapshots, active alerts and baseline status.
    #[must_use]
    pub fn get_status(&self) -> OrchestratorStatus {
        let snapshots = self
            .ingestor
            .engine()
            .snapshots()
            .into_iter()
            .map(|(key, snapshot)| StreamSnapshot {
                source_id: key.source_id,
                metric_name: key.metric_name,
                trend: snapshot.trend(),
                snapshot,
            })
            .collect();

        OrchestratorStatus {
            run: self.scenarios.status(),
            snapshots,
            aggregated: self.views.aggregated.borrow().clone(),
            alerts: self.views.alerts.borrow().clone(),
            baseline: self.baseline.status(),
            components: self.registry.snapshots(),
            ingest: self.ingestor.stats(),
            generated_at: Utc::now(),
        }
    }

    // ------------------------------------------------------------------
    // Baselines
    // ------------------------------------------------------------------

    /// Start a baseline capture (idle validation first, when enabled).
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::CaptureInProgress`] if one is running.
    pub async fn start_baseline(&self, duration: Option<Duration>) -> Result<BaselineStatus, BaselineError> {
        self.baseline.start_capture(duration).await
    }

    /// Run idle validation on its own.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::CaptureInProgress`] if a capture is running.
    pub async fn validate_idle(&self) -> Result<BaselineStatus, BaselineError> {
        self.baseline.validate_idle().await
    }

    /// Cancel a running validation or capture.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::ManagerUnavailable`] after shutdown.
    pub async fn cancel_baseline(&self) -> Result<bool, BaselineError> {
        self.baseline.cancel().await
    }

    /// Persist the active baseline.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::NoBaseline`] if none is active, or a
    /// storage error if the write fails.
    pub async fn save_baseline(&self) -> Result<StoredBaseline, AppError> {
        let active = self.baseline.active().ok_or(BaselineError::NoBaseline)?;
        let stored = self.store.save(&active).await?;
        info!(baseline_id = %stored.id, quality = %stored.quality, "Saved baseline");
        Ok(stored)
    }

    /// Restore a saved baseline (`id`, or the latest) and make it active.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::NoBaseline`] if nothing was saved, a
    /// storage error for an unknown id, or
    /// [`BaselineError::CaptureInProgress`] while a capture runs.
    pub async fn load_baseline(&self, id: Option<&str>) -> Result<LoadedBaseline, AppError> {
        let record = match id {
            Some(id) => self.store.load(id).await?,
            None => self.store.load_latest().await?.ok_or(BaselineError::NoBaseline)?,
        };
        let age_secs = record.age(Utc::now()).num_seconds();
        let baseline = ActiveBaselineSummary::from(&record);
        if age_secs > 24 * 3600 {
            warn!(baseline_id = %baseline.id, age_secs, "Loaded baseline is more than a day old");
        }
        let status = self.baseline.install(record).await?;
        Ok(LoadedBaseline {
            baseline,
            age_secs,
            status,
        })
    }

    /// Saved baselines, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn baseline_history(&self, limit: u32) -> Result<Vec<StoredBaseline>, AppError> {
        Ok(self.store.list(limit).await?)
    }

    // ------------------------------------------------------------------
    // Metrics and components
    // ------------------------------------------------------------------

    /// Ingest one component report.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedReport`] for an unusable report.
    pub fn ingest(&self, report: &RawReport) -> Result<IngestOutcome, ValidationError> {
        self.ingestor.ingest(report)
    }

    /// Register a component driven through the command topic; returns
    /// whether it replaced an earlier registration.
    pub fn register_component(&self, component_id: &str, role: ComponentRole) -> bool {
        let control = Arc::new(BroadcastStressor::new(component_id, role, Arc::clone(&self.topic)));
        self.register_proxy(StressorControlProxy::new(
            component_id,
            role,
            control,
            self.config.control.clone(),
        ))
    }

    /// Register a component behind any transport.
    pub fn register_proxy(&self, proxy: StressorControlProxy) -> bool {
        self.registry.register(proxy).is_some()
    }

    /// Registered components.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentSnapshot> {
        self.registry.snapshots()
    }

    /// Commands published after `after_sequence`, optionally for one component.
    #[must_use]
    pub fn component_commands(&self, after_sequence: u64, component_id: Option<&str>) -> Vec<ComponentCommand> {
        self.topic.since(after_sequence, component_id)
    }

    /// Live command feed for components pulling over a channel.
    #[must_use]
    pub fn subscribe_commands(&self) -> broadcast::Receiver<ComponentCommand> {
        self.topic.subscribe()
    }

    // ------------------------------------------------------------------
    // Event channels
    // ------------------------------------------------------------------

    /// Phase-progress events.
    #[must_use]
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ScenarioEvent> {
        self.bus.subscribe_progress()
    }

    /// Aggregated metrics.
    #[must_use]
    pub fn subscribe_aggregated(&self) -> broadcast::Receiver<AggregatedMetrics> {
        self.bus.subscribe_aggregated()
    }

    /// Raised alerts.
    #[must_use]
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.bus.subscribe_alerts()
    }

    /// Baseline status changes.
    #[must_use]
    pub fn subscribe_baseline(&self) -> broadcast::Receiver<BaselineStatus> {
        self.bus.subscribe_baseline()
    }

    /// Abort any run, cancel any capture, then stop every task.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        match self.scenarios.abort("shutdown").await {
            Ok(run) => info!(status = %run.status, "Scenario aborted for shutdown"),
            Err(ScenarioError::NotRunning | ScenarioError::EngineUnavailable) => {}
            Err(e) => warn!(error = %e, "Scenario abort failed during shutdown"),
        }
        if let Ok(true) = self.baseline.cancel().await {
            info!("Baseline capture cancelled for shutdown");
        }

        let _ = self.shutdown_tx.send(true);
        let tasks = match self.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Orchestrator stopped");
    }
}

async fn forward_baseline_status(
    mut status_rx: watch::Receiver<BaselineStatus>,
    bus: EventBus,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                bus.publish_baseline(status);
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
