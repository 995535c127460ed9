//! End-to-end analysis
//!
//! Loader → Classifier → Reconciler → Aggregator → Comparator. Every stage
//! runs to completion before the next starts; the first fatal error aborts
//! the run. The aggregate set can be served from an [`AggregateCache`].

use crate::aggregate::{aggregate_all, AggregateSet, AggregateTable};
use crate::cache::AggregateCache;
use crate::compare::{compare, ComparisonResult};
use crate::config::{AnalysisConfig, ComparisonSpec};
use crate::error::{AnalysisError, Result};
use crate::loader::{parse_loaded, read_sources, LoadedSource, RecordSource};
use crate::outcome::classify_all;
use crate::reconcile::reconcile;
use crate::record::ConfigLabel;
use crate::report::{AnalysisReport, LoadStats};

/// Load, classify, reconcile and aggregate the given sources
pub fn build_aggregates(
    config: &AnalysisConfig,
    sources: &[RecordSource],
) -> Result<(AggregateSet, LoadStats)> {
    build_aggregates_from(config, &read_sources(sources)?)
}

/// [`build_aggregates`] over sources that were already read
pub fn build_aggregates_from(
    config: &AnalysisConfig,
    sources: &[LoadedSource],
) -> Result<(AggregateSet, LoadStats)> {
    let table = parse_loaded(sources, &config.schema)?;
    let records = table.len();
    let classified = classify_all(table.records, &config.schema.markers())?;
    let reconciled = reconcile(classified, config.universe)?;
    let aggregates = aggregate_all(&reconciled, &config.aggregation)?;

    let stats = LoadStats {
        records,
        instances: reconciled.universe().len(),
        unsolvable_removed: reconciled.unsolvable_removed,
        intersect_dropped: reconciled.intersect_dropped,
    };
    Ok((aggregates, stats))
}

/// The comparisons to run: the configured ones, or every pair in label order
pub fn requested_comparisons(config: &AnalysisConfig, aggregates: &AggregateSet) -> Vec<ComparisonSpec> {
    if !config.comparisons.is_empty() {
        return config.comparisons.clone();
    }
    let labels: Vec<_> = aggregates.configurations().collect();
    let mut pairs = Vec::new();
    for (i, a) in labels.iter().enumerate() {
        for b in &labels[i + 1..] {
            pairs.push(ComparisonSpec::new((*a).clone(), (*b).clone()));
        }
    }
    pairs
}

/// Run every comparison against the full aggregate set as context
pub fn compare_all(
    config: &AnalysisConfig,
    aggregates: &AggregateSet,
    specs: &[ComparisonSpec],
) -> Result<Vec<ComparisonResult>> {
    let context: Vec<&AggregateTable> = aggregates.tables.values().collect();
    let lookup = |label: &ConfigLabel| {
        aggregates.get(label).ok_or_else(|| {
            let known: Vec<String> = aggregates.configurations().map(|c| c.to_string()).collect();
            AnalysisError::Config(format!(
                "unknown configuration '{}' (known: {})",
                label,
                known.join(", ")
            ))
        })
    };

    specs
        .iter()
        .map(|spec| {
            let a = lookup(&spec.a)?;
            let b = lookup(&spec.b)?;
            let mut result = compare(a, b, &context, &config.comparison)?;
            result.label = spec.label.clone();
            Ok(result)
        })
        .collect()
}

/// Run a complete analysis
///
/// With a cache, a hit skips loading and aggregation entirely; a miss
/// rebuilds the aggregates and stores them. A failed store is logged, not
/// fatal.
pub fn run_analysis(
    config: &AnalysisConfig,
    sources: &[RecordSource],
    cache: Option<&AggregateCache>,
) -> Result<AnalysisReport> {
    config.validate()?;
    if sources.is_empty() {
        return Err(AnalysisError::Config("no run tables given".to_string()));
    }

    let loaded = read_sources(sources)?;
    let key = match cache {
        Some(_) => Some(AggregateCache::key(
            &config.schema,
            &config.aggregation,
            config.universe,
            &loaded,
        )?),
        None => None,
    };

    let cached = match (cache, key.as_deref()) {
        (Some(cache), Some(key)) => cache.load(key),
        _ => None,
    };

    let (aggregates, stats) = match cached {
        Some(aggregates) => (aggregates, None),
        None => {
            let (aggregates, stats) = build_aggregates_from(config, &loaded)?;
            if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
                if let Err(e) = cache.store(key, &aggregates) {
                    tracing::warn!(path = %cache.path().display(), "cannot write cache: {}", e);
                }
            }
            (aggregates, Some(stats))
        }
    };

    let specs = requested_comparisons(config, &aggregates);
    let comparisons = compare_all(config, &aggregates, &specs)?;
    tracing::info!(
        configurations = aggregates.len(),
        comparisons = comparisons.len(),
        "analysis complete"
    );

    Ok(AnalysisReport::new(&config.schema, &aggregates, comparisons, stats))
}
