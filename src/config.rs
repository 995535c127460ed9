// Analysis configuration
//
// One TOML file describes the whole analysis: column layout, sample
// requirements, comparison policy, which pairs to compare and where the run
// tables live. Every section is optional.

use crate::aggregate::AggregationOptions;
use crate::compare::ComparisonOptions;
use crate::error::{AnalysisError, Result};
use crate::loader::RecordSource;
use crate::reconcile::UniversePolicy;
use crate::record::ConfigLabel;
use crate::schema::Schema;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One requested comparison: B is compared against A
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSpec {
    pub a: ConfigLabel,
    pub b: ConfigLabel,
    /// Free-text description printed in place of the labels
    #[serde(default)]
    pub label: Option<String>,
}

impl ComparisonSpec {
    pub fn new(a: impl Into<ConfigLabel>, b: impl Into<ConfigLabel>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            label: None,
        }
    }

    /// Parse `A:B`
    pub fn parse(spec: &str) -> Result<Self> {
        match spec.split_once(':') {
            Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok(Self::new(a, b)),
            _ => Err(AnalysisError::Config(format!(
                "comparison must be written A:B, got '{}'",
                spec
            ))),
        }
    }
}

/// A run table listed in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub path: PathBuf,
    /// Label every row of this file with this configuration
    #[serde(default)]
    pub config: Option<String>,
}

impl SourceSpec {
    pub fn to_source(&self) -> RecordSource {
        let source = RecordSource::file(&self.path);
        match &self.config {
            Some(label) => source.with_config(ConfigLabel::new(label.as_str())),
            None => source,
        }
    }
}

/// Complete analysis configuration
///
/// # Example
/// ```
/// use runcompare::config::AnalysisConfig;
///
/// let config = AnalysisConfig::from_str(
///     r#"
/// universe = "intersect"
///
/// [aggregation]
/// min_samples = 10
///
/// [[compare]]
/// a = "0|2"
/// b = "1|2"
/// "#,
/// )
/// .unwrap();
/// assert_eq!(config.aggregation.min_samples, 10);
/// assert_eq!(config.comparisons.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub universe: UniversePolicy,
    pub schema: Schema,
    pub aggregation: AggregationOptions,
    pub comparison: ComparisonOptions,
    #[serde(rename = "compare")]
    pub comparisons: Vec<ComparisonSpec>,
    #[serde(rename = "source")]
    pub sources: Vec<SourceSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            universe: UniversePolicy::Reject,
            schema: Schema::default(),
            aggregation: AggregationOptions::default(),
            comparison: ComparisonOptions::default(),
            comparisons: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Ten seeds per instance-class, identical instance sets, alpha = 0.01
    pub fn strict() -> Self {
        Self {
            universe: UniversePolicy::Reject,
            aggregation: AggregationOptions::fixed(10),
            comparison: ComparisonOptions {
                significance_level: 0.01,
                ..ComparisonOptions::default()
            },
            ..Self::default()
        }
    }

    /// Any number of seeds, common instances only, alpha = 0.10
    pub fn permissive() -> Self {
        Self {
            universe: UniversePolicy::Intersect,
            aggregation: AggregationOptions::default(),
            comparison: ComparisonOptions {
                significance_level: 0.10,
                ..ComparisonOptions::default()
            },
            ..Self::default()
        }
    }

    /// Load from a TOML file
    ///
    /// Relative `[[source]]` paths are resolved against the directory of the
    /// configuration file.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read analysis config: {}", path.display()))?;
        let mut config = Self::from_str(&content)
            .with_context(|| format!("Invalid analysis config: {}", path.display()))?;

        if let Some(base) = path.parent() {
            for source in &mut config.sources {
                if source.path.is_relative() {
                    source.path = base.join(&source.path);
                }
            }
        }
        Ok(config)
    }

    /// Parse TOML text and validate it
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse TOML analysis config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        self.aggregation.validate()?;
        self.comparison.validate()?;
        for spec in &self.comparisons {
            if spec.a == spec.b {
                return Err(AnalysisError::Config(format!(
                    "comparison of '{}' against itself",
                    spec.a
                )));
            }
        }
        Ok(())
    }

    pub fn record_sources(&self) -> Vec<RecordSource> {
        self.sources.iter().map(SourceSpec::to_source).collect()
    }
}
