//! Reports → rolling statistics → alerts → status.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use stress_orchestrator::alerts::{AlertReference, Severity};
use stress_orchestrator::metrics::{ComponentKind, TrendDirection};

use super::{cpu_report, fast_config, report, start};

fn subscriber_report(sequence: u64) -> stress_orchestrator::metrics::RawReport {
    report(
        "sub-0",
        ComponentKind::Subscriber,
        sequence,
        json!({
            "message_count": 90,
            "lost_messages": 10,
            "average_rate": 45.0,
            "latency": {"mean": 0.25, "p99": 0.4}
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_report_raises_latency_and_loss_alerts() {
    let orch = start(fast_config()).await;
    let mut aggregated = orch.subscribe_aggregated();

    let outcome = orch.ingest(&subscriber_report(1)).unwrap();
    assert!(outcome.new_source);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let status = orch.get_status();
    let mut rules: Vec<_> = status.alerts.iter().map(|a| a.rule.as_str()).collect();
    rules.sort_unstable();
    assert_eq!(rules, vec!["high_latency", "message_loss"]);

    let loss = status.alerts.iter().find(|a| a.rule == "message_loss").unwrap();
    assert_eq!(loss.severity, Severity::Error);
    assert_eq!(loss.source_id.as_deref(), Some("sub-0"));
    assert!(matches!(loss.reference, AlertReference::Threshold { value } if (value - 0.05).abs() < 1e-9));

    let metrics = aggregated.recv().await.unwrap();
    assert!((metrics.total_message_rate - 45.0).abs() < 1e-9);
    assert!((metrics.average_latency_ms.unwrap() - 250.0).abs() < 1e-9);
    assert!((metrics.loss_rate.unwrap() - 0.1).abs() < 1e-9);
    assert_eq!(metrics.active_sources, 1);

    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sustained_breach_alerts_once_per_cooldown() {
    let orch = start(fast_config()).await;
    let mut alerts = orch.subscribe_alerts();

    // A new sample every second keeps the stream changing, so every
    // aggregation pass re-evaluates the breach.
    for seq in 1..=10 {
        orch.ingest(&cpu_report(seq, 99.0)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let mut raised = Vec::new();
    while let Ok(alert) = alerts.try_recv() {
        raised.push(alert);
    }
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].rule, "high_cpu");

    // Past the cooldown the same rule fires again.
    tokio::time::sleep(Duration::from_secs(25)).await;
    orch.ingest(&cpu_report(100, 99.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(alerts.try_recv().unwrap().rule, "high_cpu");

    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_reports_counted_not_recorded() {
    let orch = start(fast_config()).await;

    let first = orch.ingest(&cpu_report(7, 40.0)).unwrap();
    assert_eq!(first.accepted, 1);
    let again = orch.ingest(&cpu_report(7, 40.0)).unwrap();
    assert_eq!(again.accepted, 0);
    assert_eq!(again.duplicates, 1);
    assert!(!again.new_source);

    let status = orch.get_status();
    assert_eq!(status.snapshots[0].snapshot.count, 1);
    assert_eq!(status.ingest.reports, 2);
    assert_eq!(status.ingest.duplicates, 1);
    assert_eq!(status.ingest.sources, 1);

    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_quiet_metrics_raise_nothing() {
    let orch = start(fast_config()).await;
    for seq in 1..=5 {
        orch.ingest(&cpu_report(seq, 12.0)).unwrap();
        orch.ingest(&report(
            "mem-0",
            ComponentKind::Memory,
            seq,
            json!({"process_memory_mb": 512.0, "system_memory_percent": 41.0}),
        ))
        .unwrap();
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = orch.get_status();
    assert!(status.alerts.is_empty());
    assert_eq!(status.snapshots.len(), 3);
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_stream_trends() {
    let orch = start(fast_config()).await;
    let origin = chrono::Utc::now() - chrono::Duration::seconds(10);
    for i in 0..10_u32 {
        let at = origin + chrono::Duration::seconds(i64::from(i));
        let mut rising = cpu_report(u64::from(i) + 1, 10.0 + 5.0 * f64::from(i));
        rising.timestamp = Some(at);
        orch.ingest(&rising).unwrap();

        let mut flat = report(
            "mem-0",
            ComponentKind::Memory,
            u64::from(i) + 1,
            json!({"process_memory_mb": 512.0}),
        );
        flat.timestamp = Some(at);
        orch.ingest(&flat).unwrap();
    }

    let status = orch.get_status();
    let cpu = status
        .snapshots
        .iter()
        .find(|s| s.metric_name == "cpu_percent")
        .unwrap();
    assert_eq!(cpu.trend.direction, TrendDirection::Increasing);
    assert!((cpu.trend.slope - 5.0).abs() < 1e-6);
    assert!(cpu.trend.confidence > 0.0);

    let memory = status
        .snapshots
        .iter()
        .find(|s| s.metric_name == "process_memory_mb")
        .unwrap();
    assert_eq!(memory.trend.direction, TrendDirection::Stable);
    orch.shutdown().await;
}
