//! Baseline capture, comparison and block-policy runs.

use std::time::Duration;

use pretty_assertions::assert_eq;
use stress_orchestrator::alerts::AlertReference;
use stress_orchestrator::baseline::BaselineState;
use stress_orchestrator::config::BaselinePolicy;
use stress_orchestrator::control::ComponentRole;
use stress_orchestrator::error::BaselineError;
use stress_orchestrator::orchestrator::Orchestrator;
use stress_orchestrator::scenario::{RunStatus, ScenarioEvent};

use super::{cpu_report, fast_config, start, stops};

/// Feed steady CPU reports until the capture window has passed.
async fn capture_at(orch: &Orchestrator, cpu: f64, first_seq: u64) -> u64 {
    let mut seq = first_seq;
    for _ in 0..15 {
        orch.ingest(&cpu_report(seq, cpu)).unwrap();
        seq += 1;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    seq
}

#[tokio::test(start_paused = true)]
async fn test_capture_then_degradation_raises_deviation_alert() {
    let orch = start(fast_config()).await;

    orch.start_baseline(None).await.unwrap();
    let next = capture_at(&orch, 10.0, 1).await;
    let status = orch.get_status().baseline;
    assert_eq!(status.state, BaselineState::Active);
    let baseline_id = status.active.unwrap().id;

    // Mean of the window moves well past the 20% tolerance.
    for seq in next..next + 40 {
        orch.ingest(&cpu_report(seq, 30.0)).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let alerts = orch.get_status().alerts;
    let deviation = alerts
        .iter()
        .find(|a| a.rule == "baseline_deviation")
        .expect("deviation alert");
    assert_eq!(deviation.metric_name, "cpu_percent");
    match &deviation.reference {
        AlertReference::Baseline {
            baseline_id: id,
            baseline_mean,
            delta_pct,
            ..
        } => {
            assert_eq!(id, &baseline_id);
            assert!((baseline_mean - 10.0).abs() < 1e-9);
            assert!(*delta_pct > 20.0);
        }
        other => panic!("unexpected reference {other:?}"),
    }
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_capture_rejected_while_running() {
    let orch = start(fast_config()).await;
    orch.start_baseline(None).await.unwrap();
    assert!(matches!(
        orch.start_baseline(None).await,
        Err(BaselineError::CaptureInProgress { .. })
    ));

    assert!(orch.cancel_baseline().await.unwrap());
    assert!(!orch.cancel_baseline().await.unwrap());
    assert!(orch.get_status().baseline.active.is_none());
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_capture_without_samples_keeps_no_baseline() {
    let orch = start(fast_config()).await;
    orch.start_baseline(Some(Duration::from_secs(1))).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let status = orch.get_status().baseline;
    assert!(status.active.is_none());
    assert_eq!(status.captures_failed, 1);
    assert!(status.last_error.is_some());
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_block_policy_captures_then_runs() {
    let mut config = fast_config();
    config.scenario.baseline_policy = BaselinePolicy::Block;
    let orch = start(config).await;
    orch.register_component("cpu-load", ComponentRole::Cpu);
    let mut progress = orch.subscribe_progress();

    // Accepted even without a baseline; the run waits instead.
    orch.start_scenario("compare_to_idle").await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let run = orch.get_status().run;
    assert_eq!(run.status, RunStatus::Paused);
    assert!(run.waiting_for_baseline);
    assert_eq!(orch.get_status().baseline.state, BaselineState::Capturing);
    assert!(orch.component_commands(0, None).is_empty());

    capture_at(&orch, 6.0, 1).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = orch.get_status();
    assert_eq!(status.run.status, RunStatus::Completed);
    assert!(status.baseline.active.is_some());
    let commands = orch.component_commands(0, Some("cpu-load"));
    assert_eq!(commands.len(), 2);
    assert_eq!(stops(&commands), 1);

    let mut paused = false;
    while let Ok(event) = progress.try_recv() {
        paused |= matches!(event, ScenarioEvent::Paused { phase_index: 0, .. });
    }
    assert!(paused);
    orch.shutdown().await;
}
