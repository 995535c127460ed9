// Table-level summaries over an aggregate table
//
// These pool the per-seed solved values of many instance-classes, e.g. to
// print runtime per grid size or how much seeds of a shape scatter.

use super::{AggregateTable, AuxiliaryMean};
use crate::record::{BoundVerdict, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trueno::Vector;

/// Pooled statistics for one value of a structural parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub value: ParamValue,
    pub mean: Option<f32>,
    pub std_dev: Option<f32>,
    /// Solved samples pooled into the group
    pub solved: usize,
    pub timed_out: usize,
    pub classes: usize,
}

impl GroupSummary {
    /// Solved runs over solved plus timed-out runs of the group
    pub fn solved_fraction(&self) -> f64 {
        let usable = self.solved + self.timed_out;
        if usable == 0 {
            0.0
        } else {
            self.solved as f64 / usable as f64
        }
    }
}

/// Pool solved values by one structural parameter (e.g. grid size `g` or
/// agent count `a`)
///
/// Returns an empty list when `param_index` is out of range.
pub fn group_summary(table: &AggregateTable, param_index: usize) -> Vec<GroupSummary> {
    #[derive(Default)]
    struct Pool {
        values: Vec<f32>,
        timed_out: usize,
        classes: usize,
    }

    let mut groups: BTreeMap<&ParamValue, Pool> = BTreeMap::new();
    for (class, cell) in &table.cells {
        let Some(value) = class.params().get(param_index) else {
            return Vec::new();
        };
        let pool = groups.entry(value).or_default();
        pool.values.extend(cell.values.iter().map(|v| *v as f32));
        pool.timed_out += cell.timed_out;
        pool.classes += 1;
    }

    groups
        .into_iter()
        .map(|(value, pool)| {
            let (mean, std_dev) = if pool.values.is_empty() {
                (None, None)
            } else {
                let vec = Vector::from_slice(&pool.values);
                (vec.mean().ok(), vec.stddev().ok())
            };
            GroupSummary {
                value: value.clone(),
                mean,
                std_dev,
                solved: pool.values.len(),
                timed_out: pool.timed_out,
                classes: pool.classes,
            }
        })
        .collect()
}

/// Mean relative standard deviation over fully solved instance-classes
///
/// Classes with any timeout are skipped since their spread is censored.
pub fn average_relative_std(table: &AggregateTable) -> Option<f64> {
    let ratios: Vec<f64> = table
        .cells
        .values()
        .filter(|c| c.timed_out == 0)
        .filter_map(|c| c.relative_std())
        .collect();
    if ratios.is_empty() {
        None
    } else {
        Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
    }
}

/// Mean and population std of each auxiliary counter over all solved
/// samples of a configuration, pooled from the per-class moments
pub fn auxiliary_means(table: &AggregateTable) -> BTreeMap<String, AuxiliaryMean> {
    // (sum, sum of squares, count)
    let mut moments: BTreeMap<&str, (f64, f64, usize)> = BTreeMap::new();
    for cell in table.cells.values() {
        for (column, aux) in &cell.auxiliary {
            let n = aux.count as f64;
            let entry = moments.entry(column.as_str()).or_insert((0.0, 0.0, 0));
            entry.0 += aux.mean * n;
            entry.1 += (aux.std_dev * aux.std_dev + aux.mean * aux.mean) * n;
            entry.2 += aux.count;
        }
    }
    moments
        .into_iter()
        .filter(|(_, (_, _, count))| *count > 0)
        .map(|(column, (sum, squares, count))| {
            let n = count as f64;
            let mean = sum / n;
            let variance = (squares / n - mean * mean).max(0.0);
            (
                column.to_string(),
                AuxiliaryMean {
                    mean,
                    std_dev: variance.sqrt(),
                    count,
                },
            )
        })
        .collect()
}

/// Runs per bound verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundCounts {
    /// Achieved value equal to the initial bound
    pub tight: usize,
    /// Lower bound raised above the initial bound
    pub raised: usize,
    pub unknown: usize,
}

impl BoundCounts {
    fn add(&mut self, verdict: BoundVerdict) {
        match verdict {
            BoundVerdict::Tight => self.tight += 1,
            BoundVerdict::Raised => self.raised += 1,
            BoundVerdict::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tight + self.raised + self.unknown
    }
}

/// How often the initial bound was already tight, over all usable runs and
/// over the runs that did not solve below `slow_threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundSummary {
    pub slow_threshold: f64,
    pub all: BoundCounts,
    pub slow: BoundCounts,
}

/// `None` when the table carries no bound observations
pub fn bound_summary(table: &AggregateTable, slow_threshold: f64) -> Option<BoundSummary> {
    let mut all = BoundCounts::default();
    let mut slow = BoundCounts::default();
    for observation in table.cells.values().flat_map(|c| &c.bounds) {
        all.add(observation.verdict);
        // Timeouts never solved below the threshold
        if !matches!(observation.value, Some(v) if v < slow_threshold) {
            slow.add(observation.verdict);
        }
    }
    (all.total() > 0).then_some(BoundSummary {
        slow_threshold,
        all,
        slow,
    })
}
