//! Typed run records and instance keys
//!
//! Instance identity is an explicit, totally ordered key so that grouping
//! lands in `BTreeMap`s and every pass over the data is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A structural parameter or seed value
///
/// Cells that parse as integers are kept numeric so that `g = 10` sorts
/// after `g = 9`. Anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Text(String),
}

impl ParamValue {
    /// Parse a raw CSV cell
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(v) => ParamValue::Int(v),
            // pandas writes integer columns with NaN holes as floats ("4.0")
            Err(_) => match trimmed.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => ParamValue::Int(f as i64),
                _ => ParamValue::Text(trimmed.to_string()),
            },
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// The structural-parameter tuple without the seed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceClass(pub Vec<ParamValue>);

impl InstanceClass {
    pub fn params(&self) -> &[ParamValue] {
        &self.0
    }
}

impl fmt::Display for InstanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

/// One concrete problem instance: structural parameters plus seed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub class: InstanceClass,
    pub seed: ParamValue,
}

impl InstanceKey {
    pub fn new(params: Vec<ParamValue>, seed: ParamValue) -> Self {
        Self {
            class: InstanceClass(params),
            seed,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} seed={}", self.class, self.seed)
    }
}

/// Label distinguishing solver variants (e.g. "1|1.5|600|4|1|1")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigLabel(pub String);

impl ConfigLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigLabel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One benchmark execution, reduced to the columns the schema requires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub instance: InstanceKey,
    pub configuration: ConfigLabel,
    /// Raw outcome flag; `None` when the cell was empty
    pub flag: Option<String>,
    /// Primary metric; `None` when empty or NaN
    pub metric: Option<f64>,
    /// Auxiliary counters keyed by column name; absent cells are omitted
    pub auxiliary: BTreeMap<String, f64>,
    /// Invariant columns kept verbatim for cross-configuration agreement checks
    pub invariants: BTreeMap<String, String>,
    /// Bound columns, when the schema declares them
    #[serde(default)]
    pub bounds: Option<BoundValues>,
    /// Source name and 1-based line, for error messages
    pub origin: RecordOrigin,
}

/// Initial bound, proven lower bound and achieved value of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundValues {
    pub initial: Option<f64>,
    pub lower: Option<f64>,
    pub achieved: Option<f64>,
}

/// How a run's initial bound turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundVerdict {
    /// The achieved value equals the initial bound
    Tight,
    /// The lower bound was raised above the initial bound
    Raised,
    Unknown,
}

impl BoundValues {
    pub fn verdict(&self) -> BoundVerdict {
        match (self.initial, self.lower, self.achieved) {
            (Some(initial), _, Some(achieved)) if initial == achieved => BoundVerdict::Tight,
            (Some(initial), Some(lower), _) if lower > initial => BoundVerdict::Raised,
            _ => BoundVerdict::Unknown,
        }
    }
}

/// Where a record came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOrigin {
    pub source: String,
    pub line: usize,
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// Concatenated rows from every source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    pub records: Vec<RunRecord>,
}

impl RecordTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct configuration labels in sorted order
    pub fn configurations(&self) -> Vec<ConfigLabel> {
        let mut labels: Vec<ConfigLabel> = self
            .records
            .iter()
            .map(|r| r.configuration.clone())
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }
}
