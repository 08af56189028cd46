//! Rolling statistics throughput.
//!
//! Measures the hot paths an aggregation tick goes through: recording a
//! sample into a full window and computing a snapshot from it.

#![allow(missing_docs, clippy::cast_precision_loss)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stress_orchestrator::metrics::{percentile, MetricSample, RollingStatisticsEngine, Unit};

const WINDOW_SIZES: [usize; 3] = [100, 1_000, 10_000];

fn filled_engine(capacity: usize) -> RollingStatisticsEngine {
    let engine = RollingStatisticsEngine::with_capacity(capacity);
    for seq in 0..capacity as u64 {
        let value = 50.0 + (seq % 17) as f64;
        engine.record(&MetricSample::new("pub-0", "latency_ms", value, Unit::Milliseconds, seq));
    }
    engine
}

fn record_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");

    for &size in &WINDOW_SIZES {
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            let engine = filled_engine(size);
            let mut seq = size as u64;
            b.iter(|| {
                seq += 1;
                let sample = MetricSample::new("pub-0", "latency_ms", 42.0, Unit::Milliseconds, seq);
                black_box(engine.record(&sample))
            });
        });
    }

    group.finish();
}

fn snapshot_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    group.sample_size(30);

    for &size in &WINDOW_SIZES {
        let engine = filled_engine(size);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| black_box(engine.snapshot("pub-0", "latency_ms")));
        });
    }

    group.finish();
}

fn percentile_benchmarks(c: &mut Criterion) {
    let sorted: Vec<f64> = (0..10_000).map(f64::from).collect();
    c.bench_function("percentile_p99", |b| {
        b.iter(|| black_box(percentile(black_box(&sorted), 99.0)));
    });
}

criterion_group!(benches, record_benchmarks, snapshot_benchmarks, percentile_benchmarks);
criterion_main!(benches);
