//! Baseline lifecycle.
//!
//! This module provides:
//! - [`BaselineManager`] / [`BaselineHandle`]: the capture actor and its client
//! - [`BaselineRecord`]: an immutable, finalized baseline with quality grading
//! - [`IdleValidator`]: the idle-system gate preceding a capture
//! - [`BaselineComparison`]: the result of comparing a snapshot to the active baseline

mod capture;
mod idle;
mod manager;
mod record;

pub use capture::CaptureBuffer;
pub use idle::{IdleValidationResult, IdleValidator, IDLE_CPU_METRIC, IDLE_MEMORY_METRIC};
pub use manager::{
    ActiveBaselineSummary, BaselineCommand, BaselineHandle, BaselineManager, BaselineState,
    BaselineStatus, BASELINE_TICK, HISTORY_CAPACITY,
};
pub use record::{
    BaselineComparison, BaselineQuality, BaselineRecord, CaptureSummary, HIGH_CPU_WARNING_PCT,
    HIGH_MEMORY_WARNING_PCT,
};
