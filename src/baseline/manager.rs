//! Baseline manager actor.
//!
//! The [`BaselineManager`] runs as a background task and owns the capture
//! lifecycle; [`BaselineHandle`] is the clone-able client used by the facade
//! and the scenario engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     BaselineManager                          │
//! │  Idle → ValidatingIdle → Capturing → Finalizing → Active     │
//! │                  │                          └────→ Rejected  │
//! │                  └──(violation)──→ Idle                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Sample RX (tap)   Command RX (mpsc)   Tick   Shutdown (watch)│
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┼────────────────────────────────┐
//! │                     BaselineHandle                           │
//! │  command_tx: mpsc::Sender<BaselineCommand>                   │
//! │  status_rx:  watch::Receiver<BaselineStatus>                 │
//! │  active_rx:  watch::Receiver<Option<Arc<BaselineRecord>>>    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Comparisons read the active record straight from the watch channel, so
//! they never wait on the actor.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::config::BaselineConfig;
use crate::error::BaselineError;
use crate::metrics::{MetricSample, StatisticsSnapshot};

use super::capture::CaptureBuffer;
use super::idle::{IdleValidationResult, IdleValidator};
use super::record::{BaselineComparison, BaselineQuality, BaselineRecord, CaptureSummary};

/// How often the manager checks stage deadlines.
pub const BASELINE_TICK: Duration = Duration::from_millis(250);

/// Finalized records kept for comparison history.
pub const HISTORY_CAPACITY: usize = 32;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineState {
    /// No baseline and nothing in progress.
    Idle,
    /// Checking that the system is quiet.
    ValidatingIdle,
    /// Accumulating samples.
    Capturing,
    /// Computing statistics and quality.
    Finalizing,
    /// A baseline is available for comparison.
    Active,
    /// The last capture produced no usable data.
    Rejected,
}

impl BaselineState {
    /// Whether a validation or capture is running.
    #[must_use]
    pub const fn in_progress(self) -> bool {
        matches!(self, Self::ValidatingIdle | Self::Capturing | Self::Finalizing)
    }
}

impl fmt::Display for BaselineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ValidatingIdle => "validating_idle",
            Self::Capturing => "capturing",
            Self::Finalizing => "finalizing",
            Self::Active => "active",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Compact view of the active baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBaselineSummary {
    /// Baseline identifier.
    pub id: String,
    /// When capture started.
    pub captured_at: DateTime<Utc>,
    /// Quality grade.
    pub quality: BaselineQuality,
    /// Quality score.
    pub quality_score: f64,
    /// Samples captured.
    pub sample_count: usize,
    /// Warnings to surface.
    pub warnings: Vec<String>,
}

impl From<&BaselineRecord> for ActiveBaselineSummary {
    fn from(record: &BaselineRecord) -> Self {
        Self {
            id: record.id.clone(),
            captured_at: record.captured_at,
            quality: record.quality,
            quality_score: record.quality_score,
            sample_count: record.sample_count,
            warnings: record.warnings.clone(),
        }
    }
}

/// Published manager status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStatus {
    /// Lifecycle state.
    pub state: BaselineState,
    /// Fraction of the current stage elapsed, while one is running.
    pub stage_progress: Option<f64>,
    /// The baseline used for comparisons.
    pub active: Option<ActiveBaselineSummary>,
    /// Most recent idle validation.
    pub last_idle_validation: Option<IdleValidationResult>,
    /// Diagnostic from the most recent failed operation.
    pub last_error: Option<String>,
    /// Captures that produced a baseline.
    pub captures_completed: u64,
    /// Captures that failed validation or were rejected.
    pub captures_failed: u64,
    /// Records retained in history.
    pub history_len: usize,
    /// When this status was published.
    pub updated_at: DateTime<Utc>,
}

impl Default for BaselineStatus {
    fn default() -> Self {
        Self {
            state: BaselineState::Idle,
            stage_progress: None,
            active: None,
            last_idle_validation: None,
            last_error: None,
            captures_completed: 0,
            captures_failed: 0,
            history_len: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Commands for the manager task.
#[derive(Debug)]
pub enum BaselineCommand {
    /// Validate (if enabled) then capture.
    StartCapture {
        /// Override of the configured capture duration.
        duration: Option<Duration>,
        /// Channel for the response.
        response_tx: oneshot::Sender<Result<BaselineStatus, BaselineError>>,
    },
    /// Run idle validation alone.
    ValidateIdle {
        /// Channel for the response.
        response_tx: oneshot::Sender<Result<BaselineStatus, BaselineError>>,
    },
    /// Cancel a running validation or capture.
    Cancel {
        /// Channel for the response; `true` if something was cancelled.
        response_tx: oneshot::Sender<bool>,
    },
    /// Make a previously saved record active.
    Install {
        /// The record.
        record: BaselineRecord,
        /// Channel for the response.
        response_tx: oneshot::Sender<Result<BaselineStatus, BaselineError>>,
    },
    /// List retained records, oldest first.
    History {
        /// Channel for the response.
        response_tx: oneshot::Sender<Vec<Arc<BaselineRecord>>>,
    },
}

/// Handle for interacting with the baseline manager.
#[derive(Debug, Clone)]
pub struct BaselineHandle {
    command_tx: mpsc::Sender<BaselineCommand>,
    status_rx: watch::Receiver<BaselineStatus>,
    active_rx: watch::Receiver<Option<Arc<BaselineRecord>>>,
    tolerance_pct: f64,
}

impl BaselineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> BaselineCommand,
    ) -> Result<T, BaselineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|_| BaselineError::ManagerUnavailable)?;
        response_rx.await.map_err(|_| BaselineError::ManagerUnavailable)
    }

    /// Start a capture; returns once the first stage has begun.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::CaptureInProgress`] if one is running.
    pub async fn start_capture(&self, duration: Option<Duration>) -> Result<BaselineStatus, BaselineError> {
        self.request(|response_tx| BaselineCommand::StartCapture { duration, response_tx })
            .await?
    }

    /// Start a standalone idle validation.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::CaptureInProgress`] if one is running.
    pub async fn validate_idle(&self) -> Result<BaselineStatus, BaselineError> {
        self.request(|response_tx| BaselineCommand::ValidateIdle { response_tx })
            .await?
    }

    /// Cancel a running validation or capture.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::ManagerUnavailable`] if the task is gone.
    pub async fn cancel(&self) -> Result<bool, BaselineError> {
        self.request(|response_tx| BaselineCommand::Cancel { response_tx })
            .await
    }

    /// Install a record, e.g. one loaded from storage.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::CaptureInProgress`] if a capture is running.
    pub async fn install(&self, record: BaselineRecord) -> Result<BaselineStatus, BaselineError> {
        self.request(|response_tx| BaselineCommand::Install { record, response_tx })
            .await?
    }

    /// Retained records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::ManagerUnavailable`] if the task is gone.
    pub async fn history(&self) -> Result<Vec<Arc<BaselineRecord>>, BaselineError> {
        self.request(|response_tx| BaselineCommand::History { response_tx })
            .await
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> BaselineStatus {
        self.status_rx.borrow().clone()
    }

    /// The active baseline.
    #[must_use]
    pub fn active(&self) -> Option<Arc<BaselineRecord>> {
        self.active_rx.borrow().clone()
    }

    /// Compare a snapshot against the active baseline.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::NoBaseline`] if none is active, or
    /// [`BaselineError::MetricNotCaptured`] for an unknown metric.
    pub fn compare(&self, current: &StatisticsSnapshot, metric: &str) -> Result<BaselineComparison, BaselineError> {
        let active = self.active().ok_or(BaselineError::NoBaseline)?;
        active.compare(current, metric, self.tolerance_pct)
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BaselineStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to active baseline changes.
    #[must_use]
    pub fn subscribe_active(&self) -> watch::Receiver<Option<Arc<BaselineRecord>>> {
        self.active_rx.clone()
    }

    /// Create a handle with no manager behind it.
    ///
    /// Commands fail with [`BaselineError::ManagerUnavailable`]; the active
    /// baseline is fixed to `active`.
    #[must_use]
    pub fn for_testing(active: Option<BaselineRecord>) -> Self {
        let (command_tx, _command_rx) = mpsc::channel(1);
        let status = BaselineStatus {
            state: if active.is_some() {
                BaselineState::Active
            } else {
                BaselineState::Idle
            },
            active: active.as_ref().map(ActiveBaselineSummary::from),
            ..BaselineStatus::default()
        };
        let (status_tx, status_rx) = watch::channel(status);
        let (active_tx, active_rx) = watch::channel(active.map(Arc::new));
        // Drop the senders so nothing ever changes
        drop(status_tx);
        drop(active_tx);
        Self {
            command_tx,
            status_rx,
            active_rx,
            tolerance_pct: crate::config::DEFAULT_BASELINE_TOLERANCE_PCT,
        }
    }
}

enum Stage {
    Resting,
    Validating {
        validator: IdleValidator,
        started: Instant,
        length: Duration,
        then_capture: Option<Duration>,
    },
    Capturing {
        buffer: CaptureBuffer,
        started: Instant,
        length: Duration,
        captured_at: DateTime<Utc>,
        idle: IdleValidationResult,
    },
}

/// The baseline manager task.
pub struct BaselineManager {
    config: BaselineConfig,
    samples_rx: mpsc::UnboundedReceiver<MetricSample>,
    tap_active: Arc<AtomicBool>,
    command_rx: mpsc::Receiver<BaselineCommand>,
    status_tx: watch::Sender<BaselineStatus>,
    active_tx: watch::Sender<Option<Arc<BaselineRecord>>>,
    stage: Stage,
    state: BaselineState,
    history: Vec<Arc<BaselineRecord>>,
    last_idle_validation: Option<IdleValidationResult>,
    last_error: Option<String>,
    captures_completed: u64,
    captures_failed: u64,
}

impl BaselineManager {
    /// Create a manager and its handle.
    ///
    /// `samples_rx` and `tap_active` are the receiving side of the
    /// ingestor's [`SampleTap`](crate::metrics::SampleTap).
    #[must_use]
    pub fn new(
        config: BaselineConfig,
        samples_rx: mpsc::UnboundedReceiver<MetricSample>,
        tap_active: Arc<AtomicBool>,
    ) -> (Self, BaselineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(BaselineStatus::default());
        let (active_tx, active_rx) = watch::channel(None);

        let handle = BaselineHandle {
            command_tx,
            status_rx,
            active_rx,
            tolerance_pct: config.tolerance_pct,
        };
        let manager = Self {
            config,
            samples_rx,
            tap_active,
            command_rx,
            status_tx,
            active_tx,
            stage: Stage::Resting,
            state: BaselineState::Idle,
            history: Vec::new(),
            last_idle_validation: None,
            last_error: None,
            captures_completed: 0,
            captures_failed: 0,
        };
        (manager, handle)
    }

    /// Run the manager loop until shutdown.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(BASELINE_TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            duration_secs = self.config.duration_secs,
            idle_validation = self.config.idle_validation_enabled,
            "Baseline manager started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.check_deadline();
                }
                Some(sample) = self.samples_rx.recv() => {
                    self.observe(&sample);
                }
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Baseline manager shutting down");
                        break;
                    }
                }
            }
        }

        if self.cancel_stage("shutdown") {
            self.publish();
        }
        self.tap_active.store(false, Ordering::Release);
    }

    fn resting_state(&self) -> BaselineState {
        if self.active_tx.borrow().is_some() {
            BaselineState::Active
        } else {
            BaselineState::Idle
        }
    }

    fn stage_progress(&self) -> Option<f64> {
        let (started, length) = match &self.stage {
            Stage::Resting => return None,
            Stage::Validating { started, length, .. } | Stage::Capturing { started, length, .. } => {
                (*started, *length)
            }
        };
        if length.is_zero() {
            return Some(1.0);
        }
        Some((started.elapsed().as_secs_f64() / length.as_secs_f64()).min(1.0))
    }

    fn build_status(&self) -> BaselineStatus {
        BaselineStatus {
            state: self.state,
            stage_progress: self.stage_progress(),
            active: self.active_tx.borrow().as_deref().map(ActiveBaselineSummary::from),
            last_idle_validation: self.last_idle_validation.clone(),
            last_error: self.last_error.clone(),
            captures_completed: self.captures_completed,
            captures_failed: self.captures_failed,
            history_len: self.history.len(),
            updated_at: Utc::now(),
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.build_status());
    }

    fn transition(&mut self, state: BaselineState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "Baseline state changed");
            self.state = state;
        }
        self.publish();
    }

    fn open_tap(&mut self) {
        // Drop anything left from an earlier stage.
        while self.samples_rx.try_recv().is_ok() {}
        self.tap_active.store(true, Ordering::Release);
    }

    fn close_tap(&self) {
        self.tap_active.store(false, Ordering::Release);
    }

    fn handle_command(&mut self, command: BaselineCommand) {
        match command {
            BaselineCommand::StartCapture { duration, response_tx } => {
                let duration = duration.unwrap_or_else(|| Duration::from_secs(self.config.duration_secs));
                let result = self.begin(Some(duration));
                let _ = response_tx.send(result);
            }
            BaselineCommand::ValidateIdle { response_tx } => {
                let result = if self.config.idle_validation_enabled {
                    self.begin(None)
                } else {
                    Err(BaselineError::NotReady {
                        state: "idle validation disabled".into(),
                    })
                };
                let _ = response_tx.send(result);
            }
            BaselineCommand::Cancel { response_tx } => {
                let cancelled = self.cancel_stage("cancelled");
                if cancelled {
                    let resting = self.resting_state();
                    self.transition(resting);
                }
                let _ = response_tx.send(cancelled);
            }
            BaselineCommand::Install { record, response_tx } => {
                let result = if self.state.in_progress() {
                    Err(BaselineError::CaptureInProgress {
                        state: self.state.to_string(),
                    })
                } else {
                    tracing::info!(baseline_id = %record.id, quality = %record.quality, "Installed baseline");
                    self.activate(Arc::new(record));
                    Ok(self.build_status())
                };
                let _ = response_tx.send(result);
            }
            BaselineCommand::History { response_tx } => {
                let _ = response_tx.send(self.history.clone());
            }
        }
    }

    fn begin(&mut self, capture: Option<Duration>) -> Result<BaselineStatus, BaselineError> {
        if self.state.in_progress() {
            return Err(BaselineError::CaptureInProgress {
                state: self.state.to_string(),
            });
        }
        self.last_error = None;
        self.open_tap();

        if self.config.idle_validation_enabled {
            self.stage = Stage::Validating {
                validator: IdleValidator::new(&self.config),
                started: Instant::now(),
                length: Duration::from_secs(self.config.idle_validation_secs),
                then_capture: capture,
            };
            self.transition(BaselineState::ValidatingIdle);
        } else if let Some(length) = capture {
            self.begin_capture(length, IdleValidationResult::skipped());
        }
        Ok(self.build_status())
    }

    fn begin_capture(&mut self, length: Duration, idle: IdleValidationResult) {
        tracing::info!(duration_secs = length.as_secs(), "Baseline capture started");
        self.stage = Stage::Capturing {
            buffer: CaptureBuffer::new(),
            started: Instant::now(),
            length,
            captured_at: Utc::now(),
            idle,
        };
        self.transition(BaselineState::Capturing);
    }

    fn cancel_stage(&mut self, reason: &str) -> bool {
        if matches!(self.stage, Stage::Resting) {
            return false;
        }
        tracing::info!(state = %self.state, reason, "Baseline operation cancelled");
        self.stage = Stage::Resting;
        self.close_tap();
        self.last_error = Some(reason.to_string());
        true
    }

    fn observe(&mut self, sample: &MetricSample) {
        let violation = match &mut self.stage {
            Stage::Resting => return,
            Stage::Validating {
                validator,
                then_capture,
                ..
            } => validator
                .observe(sample)
                .err()
                .map(|reason| (reason, then_capture.is_some())),
            Stage::Capturing { buffer, .. } => {
                buffer.push(sample);
                None
            }
        };
        if let Some((reason, was_capture)) = violation {
            self.fail_validation(reason, was_capture);
        }
    }

    fn fail_validation(&mut self, reason: String, was_capture: bool) {
        tracing::warn!(reason = %reason, "Idle validation failed");
        self.stage = Stage::Resting;
        self.close_tap();
        self.last_idle_validation = Some(IdleValidationResult {
            validated: false,
            skipped: false,
            samples: 0,
            cpu_mean: None,
            cpu_stddev: None,
            memory_peak: None,
            message: reason.clone(),
            checked_at: Utc::now(),
        });
        self.last_error = Some(BaselineError::IdleValidationFailed { reason }.to_string());
        if was_capture {
            self.captures_failed += 1;
        }
        let resting = self.resting_state();
        self.transition(resting);
    }

    fn check_deadline(&mut self) {
        let expired = match &self.stage {
            Stage::Resting => return,
            Stage::Validating { started, length, .. } | Stage::Capturing { started, length, .. } => {
                started.elapsed() >= *length
            }
        };
        if !expired {
            self.publish();
            return;
        }

        match std::mem::replace(&mut self.stage, Stage::Resting) {
            Stage::Resting => {}
            Stage::Validating {
                validator,
                then_capture,
                ..
            } => match validator.finish() {
                Ok(result) => {
                    tracing::info!(message = %result.message, "Idle validation passed");
                    self.last_idle_validation = Some(result.clone());
                    if let Some(length) = then_capture {
                        self.begin_capture(length, result);
                    } else {
                        self.close_tap();
                        let resting = self.resting_state();
                        self.transition(resting);
                    }
                }
                Err(reason) => self.fail_validation(reason, then_capture.is_some()),
            },
            Stage::Capturing {
                buffer,
                started,
                captured_at,
                idle,
                ..
            } => {
                self.close_tap();
                self.transition(BaselineState::Finalizing);
                let summary = CaptureSummary {
                    captured_at,
                    duration_secs: started.elapsed().as_secs_f64(),
                    sample_count: buffer.sample_count(),
                    metrics: buffer.finish(),
                    idle_validation: idle,
                };
                self.finalize(summary);
            }
        }
    }

    fn finalize(&mut self, summary: CaptureSummary) {
        match BaselineRecord::finalize(summary, self.config.quality_threshold, self.config.min_samples) {
            Ok(record) => {
                tracing::info!(
                    baseline_id = %record.id,
                    quality = %record.quality,
                    quality_score = record.quality_score,
                    samples = record.sample_count,
                    "Baseline finalized"
                );
                for warning in &record.warnings {
                    tracing::warn!(baseline_id = %record.id, warning = %warning, "Baseline warning");
                }
                self.captures_completed += 1;
                self.activate(Arc::new(record));
            }
            Err(e) => {
                tracing::error!(error = %e, "Baseline capture rejected");
                self.captures_failed += 1;
                self.last_error = Some(e.to_string());
                self.transition(BaselineState::Rejected);
            }
        }
    }

    fn activate(&mut self, record: Arc<BaselineRecord>) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.remove(0);
        }
        self.history.push(Arc::clone(&record));
        self.active_tx.send_replace(Some(record));
        self.last_error = None;
        self.transition(BaselineState::Active);
    }
}
