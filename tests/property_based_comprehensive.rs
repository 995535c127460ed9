//! Property-based tests for the analysis pipeline
//!
//! Designed to run in a few seconds as a pre-commit quality gate.
//!
//! Properties covered:
//! 1. Divergence antisymmetry under swapping A and B
//! 2. Mann-Whitney U invariance to input order, p-values in [0, 1]
//! 3. Aggregation idempotence (bit-identical re-runs)
//! 4. Solved counts bounded by the instance-class count
//! 5. Penalty check rejects any penalty not above the observed maximum
//! 6. CSV parsing never panics on arbitrary bytes

use proptest::prelude::*;
use runcompare::aggregate::{mean_and_population_std, AggregateCell, AggregateTable};
use runcompare::compare::{compare, mann_whitney_greater, ComparisonOptions};
use runcompare::config::AnalysisConfig;
use runcompare::error::AnalysisError;
use runcompare::loader::{parse_source, RecordSource};
use runcompare::pipeline::build_aggregates;
use runcompare::record::{ConfigLabel, InstanceClass, ParamValue};
use runcompare::schema::Schema;
use std::collections::BTreeMap;

fn cell(values: &[f64]) -> AggregateCell {
    let (mean, std_dev) = mean_and_population_std(values)
        .map(|(m, s)| (Some(m), Some(s)))
        .unwrap_or((None, None));
    AggregateCell {
        mean,
        std_dev,
        median: None,
        max_value: values.iter().copied().reduce(f64::max),
        solved: values.len(),
        timed_out: usize::from(values.is_empty()),
        unsolvable: 0,
        values: values.to_vec(),
        auxiliary: BTreeMap::new(),
        bounds: Vec::new(),
    }
}

fn table(label: &str, means: &[Option<f64>]) -> AggregateTable {
    AggregateTable {
        configuration: ConfigLabel::new(label),
        cells: means
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let values: Vec<f64> = m.iter().copied().collect();
                (InstanceClass(vec![ParamValue::Int(i as i64)]), cell(&values))
            })
            .collect(),
    }
}

fn means_strategy(len: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.8, 1.0f64..1.0e4), len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_divergence_is_antisymmetric(
        (a, b) in (1usize..20).prop_flat_map(|n| (means_strategy(n), means_strategy(n)))
    ) {
        let ta = table("A", &a);
        let tb = table("B", &b);
        let options = ComparisonOptions::with_penalty(1.0e6);

        let ab = compare(&ta, &tb, &[], &options).unwrap();
        let ba = compare(&tb, &ta, &[], &options).unwrap();

        prop_assert_eq!(ab.divergence, -ba.divergence);
        prop_assert_eq!(ab.solved_a, ba.solved_b);
        prop_assert_eq!(ab.solved_b, ba.solved_a);
    }

    #[test]
    fn prop_solved_counts_bounded(
        (a, b) in (0usize..20).prop_flat_map(|n| (means_strategy(n), means_strategy(n)))
    ) {
        prop_assume!(!a.is_empty());
        let ta = table("A", &a);
        let tb = table("B", &b);
        let result = compare(&ta, &tb, &[], &ComparisonOptions::default()).unwrap();

        prop_assert!(result.solved_a <= result.classes);
        prop_assert!(result.solved_b <= result.classes);
        prop_assert_eq!(result.solved_a, a.iter().filter(|m| m.is_some()).count());
        prop_assert!(result.points.len() + result.noise_floor_excluded == result.classes);
    }

    #[test]
    fn prop_penalty_must_exceed_max(
        values in prop::collection::vec(1.0f64..1.0e4, 1..10),
        shortfall in 0.0f64..1.0,
    ) {
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let means: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
        let ta = table("A", &means);
        let tb = table("B", &means);

        let penalty = max * (1.0 - shortfall * 0.5);
        let result = compare(&ta, &tb, &[], &ComparisonOptions::with_penalty(penalty));
        let is_invalid_penalty = matches!(result, Err(AnalysisError::InvalidPenalty { .. }));
        prop_assert!(is_invalid_penalty);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_mwu_order_invariant(
        x in prop::collection::vec(0.0f64..100.0, 1..30),
        y in prop::collection::vec(0.0f64..100.0, 1..30),
    ) {
        let forward = mann_whitney_greater(&x, &y).unwrap();

        let mut xr = x.clone();
        xr.reverse();
        let mut yr = y.clone();
        yr.reverse();
        let reversed = mann_whitney_greater(&xr, &yr).unwrap();

        prop_assert_eq!(forward.u, reversed.u);
        prop_assert_eq!(forward.method, reversed.method);
        prop_assert!((forward.p_value - reversed.p_value).abs() < 1e-12);
        prop_assert!((0.0..=1.0).contains(&forward.p_value));
    }

    #[test]
    fn prop_mwu_u_statistics_sum(
        x in prop::collection::vec(0.0f64..100.0, 1..20),
        y in prop::collection::vec(0.0f64..100.0, 1..20),
    ) {
        // U(x, y) + U(y, x) = |x| * |y|
        let uxy = mann_whitney_greater(&x, &y).unwrap().u;
        let uyx = mann_whitney_greater(&y, &x).unwrap().u;
        prop_assert!((uxy + uyx - (x.len() * y.len()) as f64).abs() < 1e-9);
    }

    #[test]
    fn prop_parse_source_never_panics(data in prop::collection::vec(any::<u8>(), 0..200)) {
        let _ = parse_source("fuzz.csv", &data, &Schema::default(), None);
    }

    #[test]
    fn prop_parse_source_with_header_never_panics(body in "[0-9a-z,\"\r\n ]{0,200}") {
        let text = format!("g,b,a,c,seed,config,result,t_total\n{}", body);
        let _ = parse_source("fuzz.csv", text.as_bytes(), &Schema::default(), None);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_aggregation_is_idempotent(
        runs in prop::collection::vec(
            (0i64..4, prop::option::weighted(0.8, 0.0f64..1.0e3), prop::option::weighted(0.8, 0.0f64..1.0e3)),
            1..10,
        )
    ) {
        // Both configurations ran every (g, seed) pair; None is a timeout
        let mut csv = String::from("g,seed,config,result,t_total\n");
        for (seed, (g, a, b)) in runs.iter().enumerate() {
            for (label, metric) in [("A", a), ("B", b)] {
                match metric {
                    Some(v) => csv.push_str(&format!("{},{},{},,{}\n", g, seed, label, v)),
                    None => csv.push_str(&format!("{},{},{},Timeout,\n", g, seed, label)),
                }
            }
        }

        let config = AnalysisConfig {
            schema: Schema {
                params: vec!["g".to_string()],
                ..Schema::default()
            },
            ..AnalysisConfig::default()
        };
        let sources = [RecordSource::inline("runs.csv", csv)];

        let (first, _) = build_aggregates(&config, &sources).unwrap();
        let (second, _) = build_aggregates(&config, &sources).unwrap();
        prop_assert_eq!(&first, &second);

        for table in first.tables.values() {
            prop_assert!(table.solved_count() <= table.len());
            for cell in table.cells.values() {
                // Floor of one applies to every solved value
                prop_assert!(cell.values.iter().all(|v| *v >= 1.0));
            }
        }
    }
}
