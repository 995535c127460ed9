//! Outcome classification
//!
//! Maps the raw outcome flag and primary metric of a run onto a closed set of
//! outcome classes. Timeouts and proven-unsolvable runs must never leak into
//! numeric means, and unknown sentinels must never be guessed at.

use crate::error::{AnalysisError, Result};
use crate::record::RunRecord;
use serde::{Deserialize, Serialize};

/// Smallest value a solved metric is reported as
///
/// Sub-unit timings would make log-ratios explode toward -inf.
pub const METRIC_FLOOR: f64 = 1.0;

/// Outcome of a single run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Terminated with a result; value already floored at [`METRIC_FLOOR`]
    Solved(f64),
    /// Ran out of budget; counted, never averaged
    Timeout,
    /// Proven to have no solution; excluded from all accounting
    Unsolvable,
}

impl Outcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            Outcome::Solved(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, Outcome::Solved(_))
    }
}

/// Sentinel strings in the outcome column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMarkers {
    pub timeout: String,
    pub unsolvable: String,
}

impl Default for OutcomeMarkers {
    fn default() -> Self {
        Self {
            timeout: "Timeout".to_string(),
            unsolvable: "Unsolvable".to_string(),
        }
    }
}

/// Classify a flag/metric pair
///
/// Returns `None` when the pair is ambiguous; callers attach row context.
///
/// # Example
/// ```
/// use runcompare::outcome::{classify, Outcome, OutcomeMarkers};
///
/// let markers = OutcomeMarkers::default();
/// assert_eq!(classify(None, Some(0.3), &markers), Some(Outcome::Solved(1.0)));
/// assert_eq!(classify(Some("Timeout"), None, &markers), Some(Outcome::Timeout));
/// assert_eq!(classify(Some("Crashed"), Some(5.0), &markers), None);
/// ```
pub fn classify(flag: Option<&str>, metric: Option<f64>, markers: &OutcomeMarkers) -> Option<Outcome> {
    let flag = flag.map(str::trim).filter(|f| !f.is_empty());

    match (flag, metric) {
        (None, Some(v)) if v.is_finite() => Some(Outcome::Solved(v.max(METRIC_FLOOR))),
        (Some(f), _) if f == markers.timeout => Some(Outcome::Timeout),
        (Some(f), _) if f == markers.unsolvable => Some(Outcome::Unsolvable),
        _ => None,
    }
}

/// A record paired with its outcome class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub record: RunRecord,
    pub outcome: Outcome,
}

/// Classify a loaded record, failing loudly on ambiguity
pub fn classify_record(record: RunRecord, markers: &OutcomeMarkers) -> Result<ClassifiedRecord> {
    match classify(record.flag.as_deref(), record.metric, markers) {
        Some(outcome) => Ok(ClassifiedRecord { record, outcome }),
        None => Err(AnalysisError::AmbiguousOutcome {
            source_name: record.origin.source.clone(),
            row: record.origin.line,
            flag: record.flag.clone(),
            metric: record.metric,
        }),
    }
}

/// Classify every record; the first ambiguous row aborts
pub fn classify_all(
    records: impl IntoIterator<Item = RunRecord>,
    markers: &OutcomeMarkers,
) -> Result<Vec<ClassifiedRecord>> {
    let classified = records
        .into_iter()
        .map(|r| classify_record(r, markers))
        .collect::<Result<Vec<_>>>()?;

    let timeouts = classified
        .iter()
        .filter(|c| c.outcome == Outcome::Timeout)
        .count();
    let unsolvable = classified
        .iter()
        .filter(|c| c.outcome == Outcome::Unsolvable)
        .count();
    tracing::debug!(
        total = classified.len(),
        timeouts,
        unsolvable,
        "classified run records"
    );

    Ok(classified)
}
