//! Integration tests for the stress orchestrator.
//!
//! These tests drive the public [`Orchestrator`] facade end to end:
//! - Scenario lifecycle: start → phases → complete / abort
//! - Baseline workflow: capture → compare → block-policy runs
//! - Alert pipeline: reports → statistics → alerts → status

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod alert_pipeline;
mod baseline_workflow;
mod scenario_lifecycle;

use std::sync::Arc;

use serde_json::{json, Value};
use stress_orchestrator::config::Config;
use stress_orchestrator::control::{CommandAction, ComponentCommand};
use stress_orchestrator::metrics::{ComponentKind, RawReport};
use stress_orchestrator::orchestrator::Orchestrator;
use stress_orchestrator::scenario::ScenarioCatalog;
use stress_orchestrator::storage::SqliteBaselineStore;

/// Scenarios used across the workflow tests.
const CATALOG: &str = r#"{
    "scenarios": [
        {
            "name": "pubsub_ramp",
            "description": "publisher ramp with a subscriber",
            "phases": [
                {
                    "name": "warmup",
                    "duration_secs": 2,
                    "targets": {
                        "publisher": {"rate_hz": 10},
                        "subscriber": {"enabled": true}
                    }
                },
                {
                    "name": "peak",
                    "duration_secs": 3,
                    "targets": {"publisher": {"rate_hz": 500}}
                }
            ]
        },
        {
            "name": "memory_required",
            "description": "needs a memory component",
            "phases": [
                {
                    "name": "fill",
                    "duration_secs": 2,
                    "targets": {"memory": {"target_mb": 256}},
                    "mandatory": ["memory"]
                }
            ]
        },
        {
            "name": "compare_to_idle",
            "description": "cpu load measured against a baseline",
            "phases": [
                {
                    "name": "load",
                    "duration_secs": 2,
                    "targets": {"cpu": {"target_percent": 60}},
                    "baseline_required": true
                }
            ]
        }
    ]
}"#;

/// Config with short ticks and a quick, permissive baseline capture.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.scenario.tick_interval_ms = 100;
    config.baseline.idle_validation_enabled = false;
    config.baseline.duration_secs = 2;
    config.baseline.min_samples = 1;
    config
}

/// The test catalog parsed from JSON.
pub fn catalog() -> ScenarioCatalog {
    let mut catalog = ScenarioCatalog::new();
    for def in ScenarioCatalog::parse(CATALOG).expect("catalog should parse") {
        catalog.insert(def);
    }
    catalog
}

/// Start an orchestrator over an in-memory baseline store.
pub async fn start(config: Config) -> Orchestrator {
    // Callers run with a paused clock; sqlx connects on a worker thread and
    // tokio would auto-advance past the pool acquire timeout, so resume here.
    tokio::time::resume();
    let store = SqliteBaselineStore::new_in_memory()
        .await
        .expect("in-memory store");
    tokio::time::pause();
    Orchestrator::start(config, catalog(), Arc::new(store))
}

/// A report from `source_id` with the given payload.
pub fn report(source_id: &str, kind: ComponentKind, sequence: u64, payload: Value) -> RawReport {
    RawReport {
        source_id: source_id.into(),
        kind,
        sequence,
        timestamp: None,
        payload,
    }
}

/// A CPU report carrying only `cpu_percent`.
pub fn cpu_report(sequence: u64, cpu_percent: f64) -> RawReport {
    report("cpu-0", ComponentKind::Cpu, sequence, json!({ "cpu_percent": cpu_percent }))
}

/// Stop commands in `commands`.
pub fn stops(commands: &[ComponentCommand]) -> usize {
    commands
        .iter()
        .filter(|c| c.action == CommandAction::Stop)
        .count()
}
