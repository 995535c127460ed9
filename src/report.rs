//! Reporting hand-off
//!
//! Renders an analysis as plain text (one line per comparison, optionally
//! followed by the aggregate tables), as JSON for machine parsing, or as the
//! CSV point set that external chart code plots. No charts are drawn here.

use crate::aggregate::{
    auxiliary_means, average_relative_std, bound_summary, group_summary, AggregateSet,
    AggregateTable, AuxiliaryMean, BoundCounts, BoundSummary, GroupSummary,
};
use crate::compare::ComparisonResult;
use crate::error::{AnalysisError, Result};
use crate::record::{ConfigLabel, InstanceClass};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Counts from the load and reconcile stages
///
/// Absent when the aggregates came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    pub records: usize,
    pub instances: usize,
    pub unsolvable_removed: usize,
    pub intersect_dropped: usize,
}

/// One aggregate cell flattened for output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    pub class: InstanceClass,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
    pub solved: usize,
    pub timed_out: usize,
    pub unsolvable: usize,
    pub solved_fraction: f64,
}

/// Runs pooled by the values of one structural parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBreakdown {
    pub parameter: String,
    pub groups: Vec<GroupSummary>,
}

/// Aggregates of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSummary {
    pub configuration: ConfigLabel,
    pub classes: usize,
    pub solved_classes: usize,
    pub average_relative_std: Option<f64>,
    pub auxiliary: BTreeMap<String, AuxiliaryMean>,
    /// One breakdown per structural parameter, in schema order
    pub breakdowns: Vec<ParamBreakdown>,
    pub bounds: Option<BoundSummary>,
    pub cells: Vec<CellSummary>,
}

impl ConfigurationSummary {
    pub fn from_table(schema: &Schema, table: &AggregateTable) -> Self {
        let cells = table
            .cells
            .iter()
            .map(|(class, cell)| CellSummary {
                class: class.clone(),
                mean: cell.mean,
                std_dev: cell.std_dev,
                median: cell.median,
                solved: cell.solved,
                timed_out: cell.timed_out,
                unsolvable: cell.unsolvable,
                solved_fraction: cell.solved_fraction(),
            })
            .collect();

        Self {
            configuration: table.configuration.clone(),
            classes: table.len(),
            solved_classes: table.solved_count(),
            average_relative_std: average_relative_std(table),
            auxiliary: auxiliary_means(table),
            breakdowns: schema
                .params
                .iter()
                .enumerate()
                .map(|(i, parameter)| ParamBreakdown {
                    parameter: parameter.clone(),
                    groups: group_summary(table, i),
                })
                .collect(),
            bounds: schema
                .bounds
                .as_ref()
                .and_then(|columns| bound_summary(table, columns.slow_threshold)),
            cells,
        }
    }
}

/// Everything one analysis run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub from_cache: bool,
    pub load: Option<LoadStats>,
    pub configurations: Vec<ConfigurationSummary>,
    pub comparisons: Vec<ComparisonResult>,
}

impl AnalysisReport {
    pub fn new(
        schema: &Schema,
        aggregates: &AggregateSet,
        comparisons: Vec<ComparisonResult>,
        load: Option<LoadStats>,
    ) -> Self {
        Self {
            from_cache: load.is_none(),
            load,
            configurations: aggregates
                .tables
                .values()
                .map(|table| ConfigurationSummary::from_table(schema, table))
                .collect(),
            comparisons,
        }
    }
}

/// The one-line verdict for a comparison
///
/// # Example
/// ```
/// # use runcompare::report::comparison_line;
/// # use runcompare::compare::{ComparisonResult, MwuMethod};
/// # use runcompare::record::ConfigLabel;
/// let result = ComparisonResult {
///     label: None,
///     config_a: ConfigLabel::new("A"),
///     config_b: ConfigLabel::new("B"),
///     classes: 3,
///     solved_a: 3,
///     solved_b: 2,
///     penalty: 1000.0,
///     divergence: 5.1699,
///     plotted_divergence: 5.1699,
///     p_value: 0.5,
///     mwu_method: MwuMethod::Exact,
///     significant: false,
///     welch_p_value: None,
///     test_samples: 3,
///     points: Vec::new(),
///     noise_floor_excluded: 0,
/// };
/// assert_eq!(
///     comparison_line(&result),
///     "A vs. B: Sum of difference of logarithms is 5.17, 3 vs. 2 solved (+1). p = 0.50000"
/// );
/// ```
pub fn comparison_line(result: &ComparisonResult) -> String {
    let prefix = match &result.label {
        Some(label) => format!("{}: ", label),
        None => String::new(),
    };
    format!(
        "{}{} vs. {}: Sum of difference of logarithms is {:.2}, {} vs. {} solved ({:+}). p = {:.5}",
        prefix,
        result.config_a,
        result.config_b,
        result.divergence,
        result.solved_a,
        result.solved_b,
        result.solved_delta(),
        result.p_value
    )
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

fn bound_line(counts: &BoundCounts) -> String {
    format!(
        "{} equal to the initial bound, {} above it, {} unknown",
        counts.tight, counts.raised, counts.unknown
    )
}

/// Human-readable report
pub fn render_text(report: &AnalysisReport, with_aggregates: bool) -> String {
    let mut out = String::new();

    if with_aggregates {
        for summary in &report.configurations {
            let _ = writeln!(
                out,
                "=== Configuration {} ({} of {} classes solved) ===",
                summary.configuration, summary.solved_classes, summary.classes
            );
            let _ = writeln!(
                out,
                "{:<24} {:>12} {:>12} {:>12} {:>8}",
                "class", "mean", "std", "median", "solved"
            );
            for cell in &summary.cells {
                let _ = writeln!(
                    out,
                    "{:<24} {:>12} {:>12} {:>12} {:>5}/{:<2}",
                    cell.class.to_string(),
                    fmt_opt(cell.mean, 2),
                    fmt_opt(cell.std_dev, 2),
                    fmt_opt(cell.median, 2),
                    cell.solved,
                    cell.solved + cell.timed_out
                );
            }
            for breakdown in &summary.breakdowns {
                for group in &breakdown.groups {
                    let _ = writeln!(
                        out,
                        "  {} = {}: mean {} std {}, {}/{} runs solved ({:.1}%)",
                        breakdown.parameter,
                        group.value,
                        fmt_opt(group.mean.map(f64::from), 2),
                        fmt_opt(group.std_dev.map(f64::from), 2),
                        group.solved,
                        group.solved + group.timed_out,
                        group.solved_fraction() * 100.0
                    );
                }
            }
            if let Some(rel) = summary.average_relative_std {
                let _ = writeln!(out, "  average relative std: {:.4}", rel);
            }
            for (column, aux) in &summary.auxiliary {
                let _ = writeln!(
                    out,
                    "  average {}: {:.1} (std {:.1}, {} runs)",
                    column, aux.mean, aux.std_dev, aux.count
                );
            }
            if let Some(bounds) = &summary.bounds {
                let _ = writeln!(out, "  bounds, all runs: {}", bound_line(&bounds.all));
                let _ = writeln!(
                    out,
                    "  bounds, runs not solved below {}: {}",
                    bounds.slow_threshold,
                    bound_line(&bounds.slow)
                );
            }
            out.push('\n');
        }
    }

    for result in &report.comparisons {
        out.push_str(&comparison_line(result));
        out.push('\n');
    }
    out
}

/// Pretty-printed JSON of the full report
pub fn render_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| AnalysisError::Config(format!("cannot serialize report: {}", e)))
}

/// Plotted points of every comparison, one row per point
pub fn render_points_csv(report: &AnalysisReport) -> Result<String> {
    let csv_error = |e: csv::Error| AnalysisError::Config(format!("cannot write points: {}", e));
    let mut out = csv::Writer::from_writer(Vec::new());
    out.write_record([
        "comparison",
        "class",
        "config_a",
        "config_b",
        "value_a",
        "value_b",
        "a_solved",
        "b_solved",
    ])
    .map_err(csv_error)?;

    for result in &report.comparisons {
        let name = result
            .label
            .clone()
            .unwrap_or_else(|| format!("{} vs. {}", result.config_a, result.config_b));
        for point in &result.points {
            out.write_record([
                name.clone(),
                point.class.to_string(),
                result.config_a.to_string(),
                result.config_b.to_string(),
                point.a.to_string(),
                point.b.to_string(),
                point.a_solved.to_string(),
                point.b_solved.to_string(),
            ])
            .map_err(csv_error)?;
        }
    }

    let bytes = out
        .into_inner()
        .map_err(|e| AnalysisError::Config(format!("cannot write points: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AnalysisError::Config(format!("points are not UTF-8: {}", e)))
}
