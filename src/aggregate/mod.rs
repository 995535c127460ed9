//! Per-instance-class aggregation
//!
//! Reduces the seeds of each (instance-class, configuration) pair to a mean
//! and population standard deviation over the solved samples, and keeps the
//! solved/timed-out split separately as a solved fraction.
//!
//! Iteration runs over `BTreeMap`s in key order and sums in seed order, so
//! aggregating the same reconciled table twice gives bit-identical cells.

mod summary;

pub use summary::{
    auxiliary_means, average_relative_std, bound_summary, group_summary, BoundCounts,
    BoundSummary, GroupSummary,
};

use crate::error::{AnalysisError, Result};
use crate::outcome::{ClassifiedRecord, Outcome};
use crate::reconcile::ReconciledTable;
use crate::record::{BoundVerdict, ConfigLabel, InstanceClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sample-count requirements for an instance-class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationOptions {
    /// Fewer usable (solved or timed-out) seeds than this is fatal
    pub min_samples: usize,
    /// Keep only the first N usable seeds in seed order
    pub max_samples: Option<usize>,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            min_samples: 1,
            max_samples: None,
        }
    }
}

impl AggregationOptions {
    /// Exactly `n` seeds per instance-class: at least n required, extras cut
    pub fn fixed(n: usize) -> Self {
        Self {
            min_samples: n,
            max_samples: Some(n),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_samples == 0 {
            return Err(AnalysisError::Config(
                "min_samples must be >= 1".to_string(),
            ));
        }
        if let Some(max) = self.max_samples {
            if max < self.min_samples {
                return Err(AnalysisError::Config(format!(
                    "max_samples ({}) must be >= min_samples ({})",
                    max, self.min_samples
                )));
            }
        }
        Ok(())
    }
}

/// Mean and population std of an auxiliary counter over the solved samples
/// that reported it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryMean {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

/// Bound verdict of one usable run, with its solved value if any
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundObservation {
    pub verdict: BoundVerdict,
    pub value: Option<f64>,
}

/// Aggregate over the seeds of one instance-class in one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCell {
    /// Mean of solved values; `None` when every sample timed out
    pub mean: Option<f64>,
    /// Population standard deviation of solved values
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
    pub max_value: Option<f64>,
    pub solved: usize,
    pub timed_out: usize,
    pub unsolvable: usize,
    /// Solved values in seed order
    pub values: Vec<f64>,
    pub auxiliary: BTreeMap<String, AuxiliaryMean>,
    /// One entry per usable run when the schema declares bound columns
    #[serde(default)]
    pub bounds: Vec<BoundObservation>,
}

impl AggregateCell {
    /// Solved / (solved + timed out); unsolvable runs are not in the denominator
    pub fn solved_fraction(&self) -> f64 {
        let usable = self.solved + self.timed_out;
        if usable == 0 {
            0.0
        } else {
            self.solved as f64 / usable as f64
        }
    }

    pub fn is_solved(&self) -> bool {
        self.mean.is_some()
    }

    /// Relative standard deviation (std / mean)
    pub fn relative_std(&self) -> Option<f64> {
        match (self.mean, self.std_dev) {
            (Some(mean), Some(std)) if mean != 0.0 => Some(std / mean),
            _ => None,
        }
    }
}

/// All instance-class cells of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTable {
    pub configuration: ConfigLabel,
    pub cells: BTreeMap<InstanceClass, AggregateCell>,
}

impl AggregateTable {
    pub fn get(&self, class: &InstanceClass) -> Option<&AggregateCell> {
        self.cells.get(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &InstanceClass> {
        self.cells.keys()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of instance-classes with a defined mean
    pub fn solved_count(&self) -> usize {
        self.cells.values().filter(|c| c.is_solved()).count()
    }

    /// Largest real observation in the table
    pub fn max_observed(&self) -> Option<f64> {
        self.cells
            .values()
            .filter_map(|c| c.max_value)
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }
}

/// Aggregate tables for every configuration of a reconciled table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSet {
    pub tables: BTreeMap<ConfigLabel, AggregateTable>,
}

impl AggregateSet {
    pub fn get(&self, config: &ConfigLabel) -> Option<&AggregateTable> {
        self.tables.get(config)
    }

    pub fn configurations(&self) -> impl Iterator<Item = &ConfigLabel> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Aggregate one configuration of a reconciled table
///
/// # Errors
/// `InsufficientSamples` for the first instance-class with fewer usable
/// seeds than `options.min_samples`. The whole aggregation aborts: partial
/// coverage would make cross-configuration comparisons meaningless.
pub fn aggregate_configuration(
    table: &ReconciledTable,
    config: &ConfigLabel,
    options: &AggregationOptions,
) -> Result<AggregateTable> {
    options.validate()?;
    let instances = table.instances(config).ok_or_else(|| {
        AnalysisError::Config(format!("unknown configuration '{}'", config))
    })?;

    // Instance keys order by class first, then seed
    let mut by_class: BTreeMap<&InstanceClass, Vec<&ClassifiedRecord>> = BTreeMap::new();
    for (key, classified) in instances {
        by_class.entry(&key.class).or_default().push(classified);
    }

    let mut cells = BTreeMap::new();
    for (class, runs) in by_class {
        let cell = aggregate_class(config, class, &runs, options)?;
        cells.insert(class.clone(), cell);
    }

    tracing::debug!(
        configuration = %config,
        classes = cells.len(),
        "aggregated configuration"
    );

    Ok(AggregateTable {
        configuration: config.clone(),
        cells,
    })
}

/// Aggregate every configuration
pub fn aggregate_all(table: &ReconciledTable, options: &AggregationOptions) -> Result<AggregateSet> {
    let mut tables = BTreeMap::new();
    for config in table.configurations() {
        tables.insert(config.clone(), aggregate_configuration(table, config, options)?);
    }
    tracing::info!(configurations = tables.len(), "aggregation complete");
    Ok(AggregateSet { tables })
}

fn aggregate_class(
    config: &ConfigLabel,
    class: &InstanceClass,
    runs: &[&ClassifiedRecord],
    options: &AggregationOptions,
) -> Result<AggregateCell> {
    let unsolvable = runs
        .iter()
        .filter(|r| r.outcome == Outcome::Unsolvable)
        .count();

    let limit = options.max_samples.unwrap_or(usize::MAX);
    let usable: Vec<&ClassifiedRecord> = runs
        .iter()
        .copied()
        .filter(|r| r.outcome != Outcome::Unsolvable)
        .take(limit)
        .collect();

    if usable.len() < options.min_samples {
        return Err(AnalysisError::InsufficientSamples {
            configuration: config.to_string(),
            class: class.to_string(),
            found: usable.len(),
            required: options.min_samples,
        });
    }

    let values: Vec<f64> = usable.iter().filter_map(|r| r.outcome.value()).collect();
    let timed_out = usable.len() - values.len();

    let (mean, std_dev) = mean_and_population_std(&values)
        .map(|(m, s)| (Some(m), Some(s)))
        .unwrap_or((None, None));

    let mut aux_values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for run in usable.iter().filter(|r| r.outcome.is_solved()) {
        for (column, value) in &run.record.auxiliary {
            aux_values.entry(column.as_str()).or_default().push(*value);
        }
    }
    let auxiliary = aux_values
        .into_iter()
        .filter_map(|(column, values)| {
            let (mean, std_dev) = mean_and_population_std(&values)?;
            Some((
                column.to_string(),
                AuxiliaryMean {
                    mean,
                    std_dev,
                    count: values.len(),
                },
            ))
        })
        .collect();

    let bounds = usable
        .iter()
        .filter_map(|r| {
            r.record.bounds.map(|b| BoundObservation {
                verdict: b.verdict(),
                value: r.outcome.value(),
            })
        })
        .collect();

    Ok(AggregateCell {
        mean,
        std_dev,
        median: median(&values),
        max_value: values.iter().copied().reduce(f64::max),
        solved: values.len(),
        timed_out,
        unsolvable,
        values,
        auxiliary,
        bounds,
    })
}

/// Arithmetic mean and population standard deviation (divide by n)
pub fn mean_and_population_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Median in full `f64` precision; the mean of the middle pair for even n
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
