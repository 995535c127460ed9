//! Instance reconciliation
//!
//! Groups classified runs by configuration and instance, and makes sure every
//! configuration under analysis talks about the same set of instances before
//! anything gets averaged. Duplicates are treated as corruption and are never
//! merged.

use crate::error::{AnalysisError, Result};
use crate::outcome::{ClassifiedRecord, Outcome};
use crate::record::{ConfigLabel, InstanceKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Instances of one configuration, in key order
pub type InstanceMap = BTreeMap<InstanceKey, ClassifiedRecord>;

/// What to do when configurations disagree on the instance set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniversePolicy {
    /// Fail with `UniverseMismatch`
    #[default]
    Reject,
    /// Keep only the instances every configuration ran
    Intersect,
}

/// Per-configuration instance tables over one shared universe
#[derive(Debug, Clone, Default)]
pub struct ReconciledTable {
    configs: BTreeMap<ConfigLabel, InstanceMap>,
    universe: BTreeSet<InstanceKey>,
    /// Instances removed because some configuration proved them unsolvable
    pub unsolvable_removed: usize,
    /// Instances removed by `UniversePolicy::Intersect`
    pub intersect_dropped: usize,
}

impl ReconciledTable {
    pub fn configurations(&self) -> impl Iterator<Item = &ConfigLabel> {
        self.configs.keys()
    }

    pub fn instances(&self, config: &ConfigLabel) -> Option<&InstanceMap> {
        self.configs.get(config)
    }

    pub fn universe(&self) -> &BTreeSet<InstanceKey> {
        &self.universe
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Group records by configuration, then by instance
///
/// # Errors
/// `DuplicateInstance` when an instance occurs twice within one configuration.
pub fn group_by_configuration(
    records: impl IntoIterator<Item = ClassifiedRecord>,
) -> Result<BTreeMap<ConfigLabel, InstanceMap>> {
    let mut groups: BTreeMap<ConfigLabel, InstanceMap> = BTreeMap::new();

    for classified in records {
        let config = classified.record.configuration.clone();
        let key = classified.record.instance.clone();
        let instances = groups.entry(config.clone()).or_default();

        if let Some(existing) = instances.get(&key) {
            return Err(AnalysisError::DuplicateInstance {
                configuration: config.to_string(),
                instance: key.to_string(),
                detail: format!(
                    "rows at {} and {}",
                    existing.record.origin, classified.record.origin
                ),
            });
        }
        instances.insert(key, classified);
    }

    Ok(groups)
}

/// Outer union of the solved-instance sets across configurations
///
/// Every configuration that solved an instance must report the same values
/// for the invariant columns (e.g. an optimal makespan). Returns the merged
/// instance → invariant values map.
///
/// # Errors
/// `DuplicateInstance` when two configurations disagree on an invariant
/// column, which would otherwise produce two rows for one instance.
pub fn merge_solved_instances(
    groups: &BTreeMap<ConfigLabel, InstanceMap>,
) -> Result<BTreeMap<InstanceKey, (ConfigLabel, BTreeMap<String, String>)>> {
    let mut merged: BTreeMap<InstanceKey, (ConfigLabel, BTreeMap<String, String>)> =
        BTreeMap::new();

    for (config, instances) in groups {
        for (key, classified) in instances {
            if !classified.outcome.is_solved() {
                continue;
            }
            let values = &classified.record.invariants;

            match merged.get(key) {
                None => {
                    merged.insert(key.clone(), (config.clone(), values.clone()));
                }
                Some((first_config, first_values)) => {
                    if let Some((column, ours)) = values
                        .iter()
                        .find(|(column, value)| {
                            !first_values
                                .get(*column)
                                .is_some_and(|first| same_invariant(first, value))
                        })
                    {
                        let theirs = first_values.get(column).map(String::as_str).unwrap_or("");
                        return Err(AnalysisError::DuplicateInstance {
                            configuration: config.to_string(),
                            instance: key.to_string(),
                            detail: format!(
                                "{} = {} here but {} in '{}'",
                                column, ours, theirs, first_config
                            ),
                        });
                    }
                }
            }
        }
    }

    Ok(merged)
}

/// Invariant cells agree when they are numerically equal (`12` and `12.0`)
/// or, for non-numeric cells, textually equal
fn same_invariant(left: &str, right: &str) -> bool {
    let (left, right) = (left.trim(), right.trim());
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l == r || (l.is_nan() && r.is_nan()),
        _ => left == right,
    }
}

/// Reconcile classified records into per-configuration tables over a shared
/// instance universe
pub fn reconcile(
    records: impl IntoIterator<Item = ClassifiedRecord>,
    policy: UniversePolicy,
) -> Result<ReconciledTable> {
    let mut configs = group_by_configuration(records)?;
    let solved = merge_solved_instances(&configs)?;
    tracing::debug!(
        configurations = configs.len(),
        solved_instances = solved.len(),
        "merged solved instance sets"
    );

    let unsolvable: BTreeSet<InstanceKey> = configs
        .values()
        .flat_map(|instances| instances.iter())
        .filter(|(_, c)| c.outcome == Outcome::Unsolvable)
        .map(|(key, _)| key.clone())
        .collect();
    for instances in configs.values_mut() {
        instances.retain(|key, _| !unsolvable.contains(key));
    }
    if !unsolvable.is_empty() {
        tracing::info!(
            removed = unsolvable.len(),
            "removed unsolvable instances from every configuration"
        );
    }

    let union: BTreeSet<InstanceKey> = configs
        .values()
        .flat_map(|instances| instances.keys().cloned())
        .collect();

    let universe = match policy {
        UniversePolicy::Reject => {
            check_identical(&configs, &union)?;
            union.clone()
        }
        UniversePolicy::Intersect => {
            let common: BTreeSet<InstanceKey> = union
                .iter()
                .filter(|key| configs.values().all(|instances| instances.contains_key(*key)))
                .cloned()
                .collect();
            for instances in configs.values_mut() {
                instances.retain(|key, _| common.contains(key));
            }
            common
        }
    };

    let intersect_dropped = union.len() - universe.len();
    if intersect_dropped > 0 {
        tracing::warn!(
            dropped = intersect_dropped,
            kept = universe.len(),
            "intersected configurations down to their common instances"
        );
    }

    Ok(ReconciledTable {
        configs,
        universe,
        unsolvable_removed: unsolvable.len(),
        intersect_dropped,
    })
}

fn check_identical(
    configs: &BTreeMap<ConfigLabel, InstanceMap>,
    union: &BTreeSet<InstanceKey>,
) -> Result<()> {
    for (config, instances) in configs {
        let missing: Vec<&InstanceKey> = union
            .iter()
            .filter(|key| !instances.contains_key(*key))
            .collect();
        let Some(first) = missing.first() else {
            continue;
        };

        let holder = configs
            .iter()
            .find(|(_, other)| other.contains_key(*first))
            .map(|(label, _)| label.to_string())
            .unwrap_or_default();

        return Err(AnalysisError::UniverseMismatch {
            left: config.to_string(),
            right: holder,
            detail: format!(
                "{} instance(s) missing from '{}', first: {}",
                missing.len(),
                config,
                first
            ),
        });
    }
    Ok(())
}
