//! Scenario lifecycle through the facade.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use stress_orchestrator::control::{CommandAction, ComponentRole};
use stress_orchestrator::error::ScenarioError;
use stress_orchestrator::scenario::{RunStatus, ScenarioEvent};

use super::{fast_config, start, stops};

// ============================================================================
// Complete runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_phase_run_commands_every_component() {
    let orch = start(fast_config()).await;
    orch.register_component("pub-0", ComponentRole::Publisher);
    orch.register_component("sub-0", ComponentRole::Subscriber);
    let mut progress = orch.subscribe_progress();

    let run = orch.start_scenario("pubsub_ramp").await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.phase_count, 2);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let status = orch.get_status();
    assert_eq!(status.run.status, RunStatus::Completed);
    assert!(status.run.finished_at.is_some());

    let publisher = orch.component_commands(0, Some("pub-0"));
    let actions: Vec<_> = publisher
        .iter()
        .map(|c| serde_json::to_value(&c.action).unwrap())
        .collect();
    assert_eq!(
        actions,
        vec![
            json!({"action": "apply", "parameters": {"rate_hz": 10}}),
            json!({"action": "apply", "parameters": {"rate_hz": 500}}),
            json!({"action": "stop"}),
        ]
    );
    assert_eq!(publisher[2].action, CommandAction::Stop);
    // Only targeted in the first phase, still stopped at the end.
    let subscriber = orch.component_commands(0, Some("sub-0"));
    assert_eq!(subscriber.len(), 2);
    assert_eq!(stops(&subscriber), 1);

    let mut phases = Vec::new();
    let mut finished = None;
    while let Ok(event) = progress.try_recv() {
        match event {
            ScenarioEvent::PhaseStarted { phase_name, .. } => phases.push(phase_name),
            ScenarioEvent::Finished { status, .. } => finished = Some(status),
            _ => {}
        }
    }
    assert_eq!(phases, vec!["warmup".to_string(), "peak".to_string()]);
    assert_eq!(finished, Some(RunStatus::Completed));

    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_are_pulled_incrementally() {
    let orch = start(fast_config()).await;
    orch.register_component("pub-0", ComponentRole::Publisher);

    orch.start_scenario("pubsub_ramp").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let first = orch.component_commands(0, Some("pub-0"));
    assert_eq!(first.len(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let rest = orch.component_commands(first[0].sequence, Some("pub-0"));
    assert_eq!(rest.len(), 2);
    assert!(rest.iter().all(|c| c.sequence > first[0].sequence));

    orch.shutdown().await;
}

// ============================================================================
// Rejections and failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_second_start_conflicts_and_leaves_run_untouched() {
    let orch = start(fast_config()).await;
    orch.register_component("pub-0", ComponentRole::Publisher);

    let first = orch.start_scenario("pubsub_ramp").await.unwrap();
    let err = orch.start_scenario("memory_required").await.unwrap_err();
    assert_eq!(
        err,
        ScenarioError::ConcurrentScenarioConflict {
            running: "pubsub_ramp".into(),
            requested: "memory_required".into(),
        }
    );

    let status = orch.get_status();
    assert_eq!(status.run.run_id, first.run_id);
    assert_eq!(status.run.status, RunStatus::Running);
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_scenario_rejected() {
    let orch = start(fast_config()).await;
    assert!(matches!(
        orch.start_scenario("does_not_exist").await,
        Err(ScenarioError::UnknownScenario { name }) if name == "does_not_exist"
    ));
    assert_eq!(orch.get_status().run.status, RunStatus::Idle);
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_mandatory_component_fails_run() {
    let orch = start(fast_config()).await;
    orch.register_component("pub-0", ComponentRole::Publisher);

    orch.start_scenario("memory_required").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let run = orch.get_status().run;
    assert!(matches!(&run.status, RunStatus::Failed { reason } if reason.contains("memory")));
    // Nothing was applied, so nothing needed stopping.
    assert!(orch.component_commands(0, None).is_empty());
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_baseline_required_fails_fast_without_baseline() {
    let orch = start(fast_config()).await;
    assert!(matches!(
        orch.start_scenario("compare_to_idle").await,
        Err(ScenarioError::BaselineMissing { phase, .. }) if phase == "load"
    ));
    orch.shutdown().await;
}

// ============================================================================
// Abort
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_abort_mid_phase_stops_every_modified_component() {
    let orch = start(fast_config()).await;
    orch.register_component("pub-0", ComponentRole::Publisher);
    orch.register_component("sub-0", ComponentRole::Subscriber);

    orch.start_scenario("pubsub_ramp").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let run = orch.stop_scenario().await.unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.phase_name.as_deref(), Some("warmup"));
    assert_eq!(stops(&orch.component_commands(0, None)), 2);

    // A new run can start once the previous one is terminal.
    orch.start_scenario("pubsub_ramp").await.unwrap();
    orch.shutdown().await;
    assert_eq!(orch.get_status().run.status, RunStatus::Aborted);
}
