//! Integration tests for the stress orchestrator.
//!
//! These tests verify behavior that spans process restarts and the
//! filesystem:
//! - Baseline persistence across orchestrator instances
//! - Scenario catalog files
//! - Configuration from the environment

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;
use stress_orchestrator::baseline::BaselineState;
use stress_orchestrator::config::{BaselinePolicy, Config};
use stress_orchestrator::error::{AppError, ConfigError, ValidationError};
use stress_orchestrator::metrics::{ComponentKind, RawReport};
use stress_orchestrator::orchestrator::Orchestrator;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Config pointing at a database inside `dir`, with a one-second capture.
fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database_path = dir.path().join("data").join("baselines.db").display().to_string();
    config.scenario.tick_interval_ms = 100;
    config.baseline.idle_validation_enabled = false;
    config.baseline.duration_secs = 1;
    config.baseline.min_samples = 1;
    config
}

fn cpu_report(sequence: u64, cpu_percent: f64) -> RawReport {
    RawReport {
        source_id: "cpu-0".into(),
        kind: ComponentKind::Cpu,
        sequence,
        timestamp: None,
        payload: json!({ "cpu_percent": cpu_percent }),
    }
}

/// Capture a baseline in real time and wait for it to become active.
async fn capture(orch: &Orchestrator) -> String {
    let mut events = orch.subscribe_baseline();
    orch.start_baseline(None).await.expect("capture should start");

    let feed = async {
        for seq in 1..=30 {
            orch.ingest(&cpu_report(seq, 8.0)).expect("report accepted");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    let wait_active = async {
        loop {
            let status = events.recv().await.expect("baseline events");
            if status.state == BaselineState::Active {
                return status.active.expect("active summary").id;
            }
        }
    };

    let (_, id) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(feed, wait_active)
    })
    .await
    .expect("capture should finish");
    id
}

// ============================================================================
// Baseline Persistence Tests
// ============================================================================

#[tokio::test]
#[serial]
async fn test_saved_baseline_survives_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let first = Orchestrator::from_config(config_in(&dir)).await.unwrap();
    let captured = capture(&first).await;
    let stored = first.save_baseline().await.unwrap();
    assert_eq!(stored.id, captured);
    assert!(stored.sample_count > 0);
    first.shutdown().await;

    let second = Orchestrator::from_config(config_in(&dir)).await.unwrap();
    assert!(second.get_status().baseline.active.is_none());

    let history = second.baseline_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, captured);

    let loaded = second.load_baseline(None).await.unwrap();
    assert_eq!(loaded.baseline.id, captured);
    assert_eq!(loaded.status.state, BaselineState::Active);
    assert!(loaded.age_secs < 60);
    second.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_unknown_baseline_id_is_storage_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let orch = Orchestrator::from_config(config_in(&dir)).await.unwrap();

    let err = orch.load_baseline(Some("missing-id")).await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert!(err.to_string().contains("missing-id"));
    orch.shutdown().await;
}

// ============================================================================
// Scenario Catalog Tests
// ============================================================================

#[tokio::test]
#[serial]
async fn test_catalog_file_extends_builtin_scenarios() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("scenarios.json");
    std::fs::write(
        &path,
        json!([{
            "name": "night_soak",
            "description": "long low-rate publisher soak",
            "phases": [{"name": "soak", "duration_secs": 600, "targets": {"publisher": {"rate_hz": 5}}}]
        }])
        .to_string(),
    )
    .unwrap();

    let mut config = config_in(&dir);
    config.scenarios_path = Some(path.display().to_string());
    let orch = Orchestrator::from_config(config).await.unwrap();

    let scenarios = orch.list_scenarios();
    let soak = scenarios.iter().find(|s| s.name == "night_soak").expect("custom scenario");
    assert!((soak.total_duration_secs - 600.0).abs() < f64::EPSILON);
    assert!(scenarios.iter().any(|s| s.name == "cpu_stress"));
    orch.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_invalid_catalog_file_fails_startup() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("scenarios.json");
    std::fs::write(&path, r#"[{"name": "empty", "phases": []}]"#).unwrap();

    let mut config = config_in(&dir);
    config.scenarios_path = Some(path.display().to_string());
    let err = Orchestrator::from_config(config).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::EmptyScenario { scenario }) if scenario == "empty"
    ));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
#[serial]
fn test_config_from_env_rejects_out_of_range_tick() {
    std::env::set_var("TICK_INTERVAL_MS", "50");
    let result = Config::from_env();
    std::env::remove_var("TICK_INTERVAL_MS");

    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { var, .. }) if var == "TICK_INTERVAL_MS"
    ));
}

#[test]
#[serial]
fn test_config_from_env_reads_baseline_policy() {
    std::env::set_var("BASELINE_POLICY", "Block");
    let result = Config::from_env();
    std::env::remove_var("BASELINE_POLICY");

    assert_eq!(result.unwrap().scenario.baseline_policy, BaselinePolicy::Block);
}
