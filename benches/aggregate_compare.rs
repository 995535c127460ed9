//! Aggregation and comparison throughput
//!
//! Measures the two CPU-bound stages on a synthetic grid sweep: ten seeds
//! per instance-class, two configurations, a growing number of classes.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench aggregate_compare
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use runcompare::aggregate::{aggregate_all, AggregationOptions};
use runcompare::compare::{compare, mann_whitney_greater, ComparisonOptions};
use runcompare::outcome::{classify_all, OutcomeMarkers};
use runcompare::reconcile::{reconcile, ReconciledTable, UniversePolicy};
use runcompare::record::{ConfigLabel, InstanceKey, ParamValue, RecordOrigin, RunRecord};
use std::collections::BTreeMap;

const SEEDS: i64 = 10;

/// Deterministic pseudo-timings; every 7th run of B times out
fn synthetic_runs(classes: i64) -> ReconciledTable {
    let mut records = Vec::new();
    for g in 0..classes {
        for seed in 0..SEEDS {
            for (label, scale) in [("A", 1.0), ("B", 1.15)] {
                let timed_out = label == "B" && (g * SEEDS + seed) % 7 == 0;
                let metric = (10.0 + ((g * 31 + seed * 17) % 97) as f64) * scale;
                records.push(RunRecord {
                    instance: InstanceKey::new(vec![ParamValue::Int(g)], ParamValue::Int(seed)),
                    configuration: ConfigLabel::new(label),
                    flag: timed_out.then(|| "Timeout".to_string()),
                    metric: (!timed_out).then_some(metric),
                    auxiliary: BTreeMap::new(),
                    invariants: BTreeMap::new(),
                    bounds: None,
                    origin: RecordOrigin {
                        source: "bench".to_string(),
                        line: 0,
                    },
                });
            }
        }
    }
    let classified = classify_all(records, &OutcomeMarkers::default()).unwrap();
    reconcile(classified, UniversePolicy::Reject).unwrap()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_all");
    for classes in [10i64, 100, 1000] {
        let table = synthetic_runs(classes);
        let options = AggregationOptions::fixed(SEEDS as usize);
        group.bench_with_input(BenchmarkId::from_parameter(classes), &table, |b, table| {
            b.iter(|| aggregate_all(black_box(table), &options).unwrap());
        });
    }
    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    for classes in [10i64, 100, 1000] {
        let aggregates = aggregate_all(&synthetic_runs(classes), &AggregationOptions::default()).unwrap();
        let a = aggregates.get(&ConfigLabel::new("A")).unwrap().clone();
        let b = aggregates.get(&ConfigLabel::new("B")).unwrap().clone();
        let options = ComparisonOptions::default();
        group.bench_with_input(BenchmarkId::from_parameter(classes), &(a, b), |bench, (a, b)| {
            bench.iter(|| compare(black_box(a), black_box(b), &[], &options).unwrap());
        });
    }
    group.finish();
}

fn bench_mann_whitney(c: &mut Criterion) {
    let x: Vec<f64> = (0..1000).map(|i| ((i * 37) % 1009) as f64 + 0.5).collect();
    let y: Vec<f64> = (0..1000).map(|i| ((i * 53) % 1013) as f64).collect();
    c.bench_function("mann_whitney_1000x1000", |b| {
        b.iter(|| mann_whitney_greater(black_box(&x), black_box(&y)).unwrap());
    });

    let small_x: Vec<f64> = (0..8).map(|i| i as f64 * 1.5 + 0.25).collect();
    let small_y: Vec<f64> = (0..40).map(|i| i as f64 * 0.3).collect();
    c.bench_function("mann_whitney_exact_8x40", |b| {
        b.iter(|| mann_whitney_greater(black_box(&small_x), black_box(&small_y)).unwrap());
    });
}

criterion_group!(benches, bench_aggregate, bench_compare, bench_mann_whitney);
criterion_main!(benches);
