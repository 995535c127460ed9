//! Declared column layout of the run tables

use crate::error::{AnalysisError, Result};
use crate::outcome::OutcomeMarkers;
use serde::{Deserialize, Serialize};

/// Column names the loader extracts from every source
///
/// # Example
/// ```
/// use runcompare::schema::Schema;
///
/// let schema = Schema::default();
/// assert_eq!(schema.params, vec!["g", "b", "a", "c"]);
/// assert!(schema.required_columns().contains(&"t_total".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Structural parameters in key order (seed excluded)
    pub params: Vec<String>,
    pub seed: String,
    pub config: String,
    pub outcome: String,
    /// Primary metric (elapsed time)
    pub metric: String,
    /// Optional numeric counters averaged alongside the metric
    pub auxiliary: Vec<String>,
    /// Columns every configuration that solved an instance must agree on
    pub invariants: Vec<String>,
    /// Bound-tightness columns; off unless declared
    pub bounds: Option<BoundColumns>,
    pub timeout_marker: String,
    pub unsolvable_marker: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            params: ["g", "b", "a", "c"].iter().map(|s| s.to_string()).collect(),
            seed: "seed".to_string(),
            config: "config".to_string(),
            outcome: "result".to_string(),
            metric: "t_total".to_string(),
            auxiliary: Vec::new(),
            invariants: Vec::new(),
            bounds: None,
            timeout_marker: "Timeout".to_string(),
            unsolvable_marker: "Unsolvable".to_string(),
        }
    }
}

/// Columns describing how good a run's initial bound was
///
/// `slow_threshold` is in units of the primary metric: runs that did not
/// solve below it are tallied separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundColumns {
    pub initial: String,
    pub lower: String,
    /// Value the run actually reached (e.g. the makespan)
    pub achieved: String,
    pub slow_threshold: f64,
}

impl Default for BoundColumns {
    fn default() -> Self {
        Self {
            initial: "initial_bound".to_string(),
            lower: "lower_bound".to_string(),
            achieved: "makespan".to_string(),
            slow_threshold: 500.0,
        }
    }
}

impl BoundColumns {
    pub fn columns(&self) -> [&String; 3] {
        [&self.initial, &self.lower, &self.achieved]
    }
}

impl Schema {
    /// Every column the loader must find, de-duplicated, in declaration order
    ///
    /// The configuration column is included; sources carrying a label
    /// override skip it (see [`Schema::required_columns_for`]).
    pub fn required_columns(&self) -> Vec<String> {
        self.required_columns_for(true)
    }

    pub fn required_columns_for(&self, needs_config: bool) -> Vec<String> {
        let config = needs_config.then_some(&self.config);
        let ordered = self
            .params
            .iter()
            .chain([&self.seed])
            .chain(config)
            .chain([&self.outcome, &self.metric])
            .chain(&self.auxiliary)
            .chain(&self.invariants)
            .chain(self.bounds.iter().flat_map(BoundColumns::columns));

        let mut columns: Vec<String> = Vec::new();
        for name in ordered {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        columns
    }

    pub fn markers(&self) -> OutcomeMarkers {
        OutcomeMarkers {
            timeout: self.timeout_marker.clone(),
            unsolvable: self.unsolvable_marker.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.params.is_empty() {
            return Err(AnalysisError::Config(
                "schema needs at least one structural parameter".to_string(),
            ));
        }

        let timeout = self.timeout_marker.trim();
        let unsolvable = self.unsolvable_marker.trim();
        if timeout.is_empty() || unsolvable.is_empty() {
            return Err(AnalysisError::Config(
                "outcome markers must be non-empty".to_string(),
            ));
        }
        if timeout == unsolvable {
            return Err(AnalysisError::Config(format!(
                "timeout and unsolvable markers are both '{}'",
                timeout
            )));
        }

        if let Some(bounds) = &self.bounds {
            if !bounds.slow_threshold.is_finite() || bounds.slow_threshold <= 0.0 {
                return Err(AnalysisError::Config(format!(
                    "bound slow_threshold must be a positive number, got {}",
                    bounds.slow_threshold
                )));
            }
        }

        let key_columns: Vec<&String> = self.params.iter().chain([&self.seed]).collect();
        for (i, name) in key_columns.iter().enumerate() {
            if key_columns[..i].contains(name) {
                return Err(AnalysisError::Config(format!(
                    "column '{}' appears twice in the instance key",
                    name
                )));
            }
        }

        Ok(())
    }
}
