//! Scenario engine actor.
//!
//! The [`ScenarioEngine`] owns the one active [`ScenarioRun`] and drives it
//! from a single periodic tick; [`ScenarioHandle`] is the clone-able client.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ScenarioEngine                          │
//! │  Idle → Running(0) → Running(1) → … → Completed              │
//! │            │   ↑                    ├──→ Aborted             │
//! │            ↓   │                    └──→ Failed              │
//! │          Paused (waiting for baseline)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Tick   Command RX (mpsc)   Apply reports   Shutdown (watch) │
//! └──────────────────────────────────────────────────────────────┘
//!          │ spawned fan-out: proxy.apply / proxy.poll_status
//!          ▼
//!   StressorControlProxy × N
//! ```
//!
//! Parameter application and health polls run in spawned tasks so a slow
//! component never delays phase timing or an abort. Stops are awaited
//! before a run is reported terminal.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::baseline::BaselineHandle;
use crate::config::{BaselinePolicy, ScenarioConfig};
use crate::control::{ComponentRegistry, ComponentRole, StressorControlProxy};
use crate::error::{BaselineError, ComponentError, ScenarioError};
use crate::traits::ComponentHealth;

use super::catalog::ScenarioCatalog;
use super::definition::{PhaseSpec, ScenarioDefinition, ScenarioSummary};
use super::run::{RunStatus, ScenarioEvent, ScenarioRun};

/// Minimum spacing of progress events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Commands for the engine task.
#[derive(Debug)]
pub enum ScenarioCommand {
    /// Start a scenario by name.
    Start {
        /// Scenario name.
        name: String,
        /// Channel for the response.
        response_tx: oneshot::Sender<Result<ScenarioRun, ScenarioError>>,
    },
    /// Abort the active run.
    Abort {
        /// Logged reason.
        reason: String,
        /// Channel for the response.
        response_tx: oneshot::Sender<Result<ScenarioRun, ScenarioError>>,
    },
}

/// Handle for interacting with the scenario engine.
#[derive(Debug, Clone)]
pub struct ScenarioHandle {
    command_tx: mpsc::Sender<ScenarioCommand>,
    run_rx: watch::Receiver<ScenarioRun>,
    events_tx: broadcast::Sender<ScenarioEvent>,
    catalog: Arc<ScenarioCatalog>,
}

impl ScenarioHandle {
    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<ScenarioRun, ScenarioError>>) -> ScenarioCommand,
    ) -> Result<ScenarioRun, ScenarioError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|_| ScenarioError::EngineUnavailable)?;
        response_rx.await.map_err(|_| ScenarioError::EngineUnavailable)?
    }

    /// Start `name`. Returns once the run is accepted; phases execute in
    /// the background.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::ConcurrentScenarioConflict`] if a run is
    /// active, [`ScenarioError::UnknownScenario`] for an unregistered name,
    /// [`ScenarioError::Invalid`] if the definition fails validation, or
    /// [`ScenarioError::BaselineMissing`] when the first phase needs a
    /// baseline under the fail policy.
    pub async fn start(&self, name: &str) -> Result<ScenarioRun, ScenarioError> {
        let name = name.to_string();
        self.request(|response_tx| ScenarioCommand::Start { name, response_tx })
            .await
    }

    /// Abort the active run, stopping every component it modified.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::NotRunning`] if nothing is active.
    pub async fn abort(&self, reason: &str) -> Result<ScenarioRun, ScenarioError> {
        let reason = reason.to_string();
        self.request(|response_tx| ScenarioCommand::Abort { reason, response_tx })
            .await
    }

    /// Registered scenarios.
    #[must_use]
    pub fn list(&self) -> Vec<ScenarioSummary> {
        self.catalog.summaries()
    }

    /// The catalog.
    #[must_use]
    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    /// Current or last run.
    #[must_use]
    pub fn status(&self) -> ScenarioRun {
        self.run_rx.borrow().clone()
    }

    /// Subscribe to run updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScenarioRun> {
        self.run_rx.clone()
    }

    /// Subscribe to phase-progress events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ScenarioEvent> {
        self.events_tx.subscribe()
    }

    /// Create a handle with no engine behind it.
    ///
    /// Commands fail with [`ScenarioError::EngineUnavailable`].
    #[must_use]
    pub fn for_testing(catalog: ScenarioCatalog) -> Self {
        let (command_tx, _command_rx) = mpsc::channel(1);
        let (_run_tx, run_rx) = watch::channel(ScenarioRun::default());
        let (events_tx, _) = broadcast::channel(16);
        Self {
            command_tx,
            run_rx,
            events_tx,
            catalog: Arc::new(catalog),
        }
    }
}

#[derive(Debug)]
struct ApplyOutcome {
    component_id: String,
    role: ComponentRole,
    result: Result<(), ComponentError>,
}

#[derive(Debug)]
struct ApplyReport {
    run_id: String,
    generation: u64,
    outcomes: Vec<ApplyOutcome>,
}

struct ActiveRun {
    run_id: String,
    definition: Arc<ScenarioDefinition>,
    status: RunStatus,
    phase_index: usize,
    started: Instant,
    started_at: DateTime<Utc>,
    phase_started: Instant,
    phase_started_at: DateTime<Utc>,
    waiting: bool,
    capture_requested: bool,
    // Components to stop at cleanup.
    modified: BTreeMap<String, Arc<StressorControlProxy>>,
    // Every component commanded during the run, for reporting.
    commanded: BTreeMap<String, Arc<StressorControlProxy>>,
    application: Option<JoinHandle<()>>,
    generation: u64,
    health_poll: Option<JoinHandle<()>>,
    ticks: u64,
    last_progress: Instant,
}

impl ActiveRun {
    fn phase(&self) -> Option<&PhaseSpec> {
        self.definition.phases.get(self.phase_index)
    }

    fn phase_elapsed(&self) -> Duration {
        if self.waiting {
            Duration::ZERO
        } else {
            self.phase_started.elapsed()
        }
    }

    fn phase_progress(&self) -> f64 {
        let length = self.phase().map_or(Duration::ZERO, PhaseSpec::duration);
        if length.is_zero() {
            return 1.0;
        }
        (self.phase_elapsed().as_secs_f64() / length.as_secs_f64()).min(1.0)
    }

    fn scenario_progress(&self) -> f64 {
        let total = self.definition.total_duration();
        if total.is_zero() {
            return 1.0;
        }
        let length = self.phase().map_or(Duration::ZERO, PhaseSpec::duration);
        let done = self.definition.offset_of(self.phase_index) + self.phase_elapsed().min(length);
        (done.as_secs_f64() / total.as_secs_f64()).min(1.0)
    }

    fn view(&self) -> ScenarioRun {
        ScenarioRun {
            run_id: Some(self.run_id.clone()),
            scenario: Some(self.definition.name.clone()),
            status: self.status.clone(),
            phase_index: Some(self.phase_index),
            phase_name: self.phase().map(|p| p.name.clone()),
            phase_count: self.definition.phases.len(),
            phase_started_at: Some(self.phase_started_at),
            started_at: Some(self.started_at),
            finished_at: None,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            phase_progress: self.phase_progress(),
            scenario_progress: self.scenario_progress(),
            waiting_for_baseline: self.waiting,
            components: self.commanded.values().map(|p| p.snapshot()).collect(),
            updated_at: Utc::now(),
        }
    }
}

/// The scenario engine task.
pub struct ScenarioEngine {
    config: ScenarioConfig,
    catalog: Arc<ScenarioCatalog>,
    registry: Arc<ComponentRegistry>,
    baseline: BaselineHandle,
    command_rx: mpsc::Receiver<ScenarioCommand>,
    report_tx: mpsc::UnboundedSender<ApplyReport>,
    report_rx: mpsc::UnboundedReceiver<ApplyReport>,
    run_tx: watch::Sender<ScenarioRun>,
    events_tx: broadcast::Sender<ScenarioEvent>,
    active: Option<ActiveRun>,
}

enum Step {
    Wait,
    Advance(usize),
    Resume(usize),
    Fail(String),
}

impl ScenarioEngine {
    /// Create an engine and its handle. Events are published on
    /// `events_tx`.
    #[must_use]
    pub fn new(
        config: ScenarioConfig,
        catalog: Arc<ScenarioCatalog>,
        registry: Arc<ComponentRegistry>,
        baseline: BaselineHandle,
        events_tx: broadcast::Sender<ScenarioEvent>,
    ) -> (Self, ScenarioHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (run_tx, run_rx) = watch::channel(ScenarioRun::default());
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let handle = ScenarioHandle {
            command_tx,
            run_rx,
            events_tx: events_tx.clone(),
            catalog: Arc::clone(&catalog),
        };
        let engine = Self {
            config,
            catalog,
            registry,
            baseline,
            command_rx,
            report_tx,
            report_rx,
            run_tx,
            events_tx,
            active: None,
        };
        (engine, handle)
    }

    /// Run the engine loop until shutdown. An active run is aborted on the
    /// way out.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            tick_ms = self.config.tick_interval_ms,
            scenarios = self.catalog.len(),
            baseline_policy = %self.config.baseline_policy,
            "Scenario engine started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.on_tick().await;
                }
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command).await;
                }
                Some(report) = self.report_rx.recv() => {
                    self.on_applied(report).await;
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Scenario engine shutting down");
                        break;
                    }
                }
            }
        }

        if self.active.is_some() {
            self.finish(RunStatus::Aborted, "shutdown").await;
        }
    }

    fn emit(&self, event: ScenarioEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    fn publish(&self) {
        if let Some(run) = &self.active {
            self.run_tx.send_replace(run.view());
        }
    }

    async fn handle_command(&mut self, command: ScenarioCommand) {
        match command {
            ScenarioCommand::Start { name, response_tx } => match self.accept(&name) {
                Ok(definition) => {
                    self.launch(definition);
                    let _ = response_tx.send(Ok(self.run_tx.borrow().clone()));
                    self.enter_phase(0).await;
                }
                Err(e) => {
                    tracing::warn!(scenario = %name, error = %e, "Scenario start rejected");
                    let _ = response_tx.send(Err(e));
                }
            },
            ScenarioCommand::Abort { reason, response_tx } => {
                if self.active.is_none() {
                    let _ = response_tx.send(Err(ScenarioError::NotRunning));
                    return;
                }
                self.finish(RunStatus::Aborted, &reason).await;
                let _ = response_tx.send(Ok(self.run_tx.borrow().clone()));
            }
        }
    }

    fn accept(&self, name: &str) -> Result<Arc<ScenarioDefinition>, ScenarioError> {
        if let Some(run) = &self.active {
            return Err(ScenarioError::ConcurrentScenarioConflict {
                running: run.definition.name.clone(),
                requested: name.to_string(),
            });
        }
        let definition = self
            .catalog
            .get(name)
            .ok_or_else(|| ScenarioError::UnknownScenario { name: name.to_string() })?;
        definition.validate(Duration::from_secs(self.config.max_scenario_duration_secs))?;

        if let Some(first) = definition.phases.first() {
            if first.baseline_required
                && self.config.baseline_policy == BaselinePolicy::Fail
                && self.baseline.active().is_none()
            {
                return Err(ScenarioError::BaselineMissing {
                    scenario: definition.name.clone(),
                    phase: first.name.clone(),
                });
            }
        }
        Ok(definition)
    }

    fn launch(&mut self, definition: Arc<ScenarioDefinition>) {
        let now = Instant::now();
        let at = Utc::now();
        let run = ActiveRun {
            run_id: uuid::Uuid::new_v4().to_string(),
            definition,
            status: RunStatus::Running,
            phase_index: 0,
            started: now,
            started_at: at,
            phase_started: now,
            phase_started_at: at,
            waiting: false,
            capture_requested: false,
            modified: BTreeMap::new(),
            commanded: BTreeMap::new(),
            application: None,
            generation: 0,
            health_poll: None,
            ticks: 0,
            last_progress: now,
        };
        tracing::info!(
            run_id = %run.run_id,
            scenario = %run.definition.name,
            phases = run.definition.phases.len(),
            total_secs = run.definition.total_duration().as_secs_f64(),
            "Scenario started"
        );
        self.emit(ScenarioEvent::Started {
            run_id: run.run_id.clone(),
            scenario: run.definition.name.clone(),
            phase_count: run.definition.phases.len(),
            at,
        });
        self.active = Some(run);
        self.publish();
    }

    #[allow(clippy::too_many_lines)]
    async fn enter_phase(&mut self, index: usize) {
        let Some(definition) = self.active.as_ref().map(|run| Arc::clone(&run.definition)) else {
            return;
        };
        let Some(phase) = definition.phases.get(index) else {
            self.finish(RunStatus::Completed, "all phases finished").await;
            return;
        };

        let auto = index == 0 && self.config.auto_baseline && !phase.capture_baseline;
        if (phase.baseline_required || auto) && self.baseline.active().is_none() {
            if self.config.baseline_policy == BaselinePolicy::Block || !phase.baseline_required {
                self.pause_for_baseline(index).await;
            } else {
                let reason = ScenarioError::BaselineMissing {
                    scenario: definition.name.clone(),
                    phase: phase.name.clone(),
                }
                .to_string();
                self.finish(RunStatus::Failed { reason }, "baseline missing").await;
            }
            return;
        }

        let Some(run) = self.active.as_mut() else {
            return;
        };
        if let Some(task) = run.application.take() {
            task.abort();
        }
        run.phase_index = index;
        run.phase_started = Instant::now();
        run.phase_started_at = Utc::now();
        run.status = RunStatus::Running;
        run.waiting = false;
        run.capture_requested = false;
        let run_id = run.run_id.clone();

        tracing::info!(
            run_id = %run_id,
            phase = index,
            name = %phase.name,
            duration_secs = phase.duration_secs,
            "Phase started"
        );
        self.emit(ScenarioEvent::PhaseStarted {
            run_id: run_id.clone(),
            phase_index: index,
            phase_name: phase.name.clone(),
            at: Utc::now(),
        });

        if phase.capture_baseline {
            match self.baseline.start_capture(Some(phase.duration())).await {
                Ok(status) => tracing::info!(run_id = %run_id, state = %status.state, "Phase baseline capture started"),
                Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Phase baseline capture not started"),
            }
        }

        let mut plan = Vec::new();
        for (role, params) in &phase.targets {
            let proxies = self.registry.by_role(*role);
            if proxies.is_empty() {
                if phase.mandatory.contains(role) {
                    let reason = format!("no component registered for mandatory role {role}");
                    self.finish(RunStatus::Failed { reason }, "mandatory role missing").await;
                    return;
                }
                tracing::warn!(run_id = %run_id, role = %role, "No component registered for targeted role");
                continue;
            }
            plan.extend(proxies.into_iter().map(|proxy| (proxy, params.clone())));
        }

        if let Some(run) = self.active.as_mut() {
            for (proxy, _) in &plan {
                let id = proxy.component_id().to_string();
                run.modified.entry(id.clone()).or_insert_with(|| Arc::clone(proxy));
                run.commanded.entry(id).or_insert_with(|| Arc::clone(proxy));
            }
            if !plan.is_empty() {
                run.generation += 1;
                let generation = run.generation;
                let report_tx = self.report_tx.clone();
                run.application = Some(tokio::spawn(async move {
                    let outcomes = join_all(plan.into_iter().map(|(proxy, params)| async move {
                        let result = proxy.apply(&params).await;
                        ApplyOutcome {
                            component_id: proxy.component_id().to_string(),
                            role: proxy.role(),
                            result,
                        }
                    }))
                    .await;
                    let _ = report_tx.send(ApplyReport {
                        run_id,
                        generation,
                        outcomes,
                    });
                }));
            }
        }
        self.publish();
    }

    async fn pause_for_baseline(&mut self, index: usize) {
        // Load from earlier phases would skew an idle capture.
        let loaded: Vec<_> = match self.active.as_mut() {
            Some(run) => {
                if let Some(task) = run.application.take() {
                    task.abort();
                }
                std::mem::take(&mut run.modified).into_values().collect()
            }
            None => return,
        };
        for (component_id, error) in self.stop_components(&loaded).await {
            tracing::warn!(component = %component_id, error = %error, "Stop before baseline capture failed");
        }

        let requested = match self.baseline.start_capture(None).await {
            Ok(_) => true,
            Err(BaselineError::CaptureInProgress { .. }) => false,
            Err(e) => {
                let reason = format!("baseline capture unavailable: {e}");
                self.finish(RunStatus::Failed { reason }, "baseline unavailable").await;
                return;
            }
        };

        let Some(run) = self.active.as_mut() else {
            return;
        };
        run.phase_index = index;
        run.status = RunStatus::Paused;
        run.waiting = true;
        run.capture_requested = requested;
        let run_id = run.run_id.clone();

        tracing::info!(run_id = %run_id, phase = index, "Run paused for baseline capture");
        self.emit(ScenarioEvent::Paused {
            run_id,
            phase_index: index,
            reason: "waiting for baseline capture".into(),
        });
        self.publish();
    }

    async fn on_tick(&mut self) {
        let limit = Duration::from_secs(self.config.max_scenario_duration_secs);
        let poll_every = u64::from(self.config.health_poll_ticks.max(1));

        let step = {
            let Some(run) = self.active.as_mut() else {
                return;
            };
            run.ticks += 1;
            if run.started.elapsed() > limit {
                Step::Fail(format!("exceeded maximum scenario duration of {}s", limit.as_secs()))
            } else if run.waiting {
                if self.baseline.active().is_some() {
                    Step::Resume(run.phase_index)
                } else if self.baseline.status().state.in_progress() {
                    Step::Wait
                } else {
                    let phase = run.phase().map(|p| p.name.clone()).unwrap_or_default();
                    Step::Fail(
                        ScenarioError::BaselineMissing {
                            scenario: run.definition.name.clone(),
                            phase,
                        }
                        .to_string(),
                    )
                }
            } else {
                if run.ticks % poll_every == 0 {
                    Self::spawn_health_poll(run, &self.events_tx);
                }
                let length = run.phase().map_or(Duration::ZERO, PhaseSpec::duration);
                if run.phase_started.elapsed() >= length {
                    Step::Advance(run.phase_index + 1)
                } else {
                    Step::Wait
                }
            }
        };

        match step {
            Step::Wait => {}
            Step::Advance(next) => self.enter_phase(next).await,
            Step::Resume(index) => {
                tracing::info!(phase = index, "Baseline available, resuming run");
                self.enter_phase(index).await;
            }
            Step::Fail(reason) => {
                self.finish(RunStatus::Failed { reason }, "tick").await;
            }
        }

        if let Some(run) = self.active.as_mut() {
            if !run.waiting && run.last_progress.elapsed() >= PROGRESS_INTERVAL {
                run.last_progress = Instant::now();
                let event = ScenarioEvent::Progress {
                    run_id: run.run_id.clone(),
                    phase_index: run.phase_index,
                    phase_progress: run.phase_progress(),
                    scenario_progress: run.scenario_progress(),
                    elapsed_secs: run.started.elapsed().as_secs_f64(),
                };
                tracing::debug!(run_id = %run.run_id, phase = run.phase_index, "Scenario progress");
                self.emit(event);
            }
            self.publish();
        }
    }

    fn spawn_health_poll(run: &mut ActiveRun, events_tx: &broadcast::Sender<ScenarioEvent>) {
        if run.health_poll.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let proxies: Vec<_> = run.modified.values().cloned().collect();
        if proxies.is_empty() {
            return;
        }
        let events_tx = events_tx.clone();
        let run_id = run.run_id.clone();
        run.health_poll = Some(tokio::spawn(async move {
            let results = join_all(proxies.iter().map(|proxy| proxy.poll_status())).await;
            for (proxy, result) in proxies.iter().zip(results) {
                let error = match result {
                    Ok(status) if status.health == ComponentHealth::Healthy => continue,
                    Ok(status) => format!("component reports {}", status.health),
                    Err(e) => e.to_string(),
                };
                let _ = events_tx.send(ScenarioEvent::ComponentDegraded {
                    run_id: run_id.clone(),
                    component_id: proxy.component_id().to_string(),
                    error,
                });
            }
        }));
    }

    async fn on_applied(&mut self, report: ApplyReport) {
        let mut events = Vec::new();
        let failure = {
            let Some(run) = self.active.as_mut() else {
                return;
            };
            if run.run_id != report.run_id || run.generation != report.generation || run.waiting {
                tracing::debug!(run_id = %report.run_id, "Discarding stale apply report");
                return;
            }
            run.application = None;
            let mandatory = run.phase().map(|p| p.mandatory.clone()).unwrap_or_default();

            let mut failure = None;
            for outcome in report.outcomes {
                let Err(e) = outcome.result else {
                    continue;
                };
                tracing::warn!(
                    run_id = %run.run_id,
                    component = %outcome.component_id,
                    error = %e,
                    "Component failed to apply phase parameters"
                );
                if failure.is_none() && mandatory.contains(&outcome.role) {
                    failure = Some(format!("mandatory component {} failed: {e}", outcome.component_id));
                }
                events.push(ScenarioEvent::ComponentDegraded {
                    run_id: run.run_id.clone(),
                    component_id: outcome.component_id,
                    error: e.to_string(),
                });
            }
            failure
        };

        for event in events {
            self.emit(event);
        }
        match failure {
            Some(reason) => self.finish(RunStatus::Failed { reason }, "mandatory component").await,
            None => self.publish(),
        }
    }

    async fn stop_components(&self, proxies: &[Arc<StressorControlProxy>]) -> Vec<(String, ComponentError)> {
        let results = join_all(proxies.iter().map(|proxy| proxy.stop())).await;
        proxies
            .iter()
            .zip(results)
            .filter_map(|(proxy, result)| result.err().map(|e| (proxy.component_id().to_string(), e)))
            .collect()
    }

    /// Move the active run to `status`, stopping every component it
    /// modified. Stop failures are reported, never fatal.
    async fn finish(&mut self, status: RunStatus, cause: &str) {
        let Some(mut run) = self.active.take() else {
            return;
        };
        if let Some(task) = run.application.take() {
            task.abort();
        }
        if let Some(task) = run.health_poll.take() {
            task.abort();
        }
        if run.waiting && run.capture_requested {
            match self.baseline.cancel().await {
                Ok(cancelled) => tracing::debug!(cancelled, "Cancelled pending baseline capture"),
                Err(e) => tracing::debug!(error = %e, "Baseline capture not cancelled"),
            }
        }

        let modified: Vec<_> = std::mem::take(&mut run.modified).into_values().collect();
        for (component_id, error) in self.stop_components(&modified).await {
            tracing::warn!(run_id = %run.run_id, component = %component_id, error = %error, "Cleanup stop failed");
            self.emit(ScenarioEvent::ComponentDegraded {
                run_id: run.run_id.clone(),
                component_id,
                error: error.to_string(),
            });
        }

        let completed = status == RunStatus::Completed;
        run.status = status.clone();
        let mut view = run.view();
        view.finished_at = Some(Utc::now());
        if completed {
            view.phase_progress = 1.0;
            view.scenario_progress = 1.0;
        }

        match &status {
            RunStatus::Failed { reason } => tracing::error!(
                run_id = %run.run_id,
                scenario = %run.definition.name,
                reason = %reason,
                stopped = modified.len(),
                "Scenario failed"
            ),
            _ => tracing::info!(
                run_id = %run.run_id,
                scenario = %run.definition.name,
                status = %status,
                cause,
                stopped = modified.len(),
                "Scenario finished"
            ),
        }

        self.run_tx.send_replace(view);
        self.emit(ScenarioEvent::Finished {
            run_id: run.run_id,
            scenario: run.definition.name.clone(),
            status,
            at: Utc::now(),
        });
    }
}
