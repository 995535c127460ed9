//! CLI argument parsing for runcompare

use crate::config::{AnalysisConfig, ComparisonSpec};
use crate::error::Result;
use crate::loader::RecordSource;
use crate::reconcile::UniversePolicy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the analysis report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV of the plotted points for external chart code
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "runcompare")]
#[command(version)]
#[command(about = "Compare solver configurations over repeated benchmark runs", long_about = None)]
pub struct Cli {
    /// Analysis configuration file (TOML)
    #[arg(short = 'C', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run table, optionally labelling every row with a configuration
    #[arg(short = 's', long = "source", value_name = "[LABEL=]PATH")]
    pub sources: Vec<String>,

    /// Compare configuration B against A (repeatable; default: every pair)
    #[arg(short = 'x', long = "compare", value_name = "A:B")]
    pub compare: Vec<String>,

    /// Minimum usable seeds per instance-class
    #[arg(long = "min-samples", value_name = "N")]
    pub min_samples: Option<usize>,

    /// Keep only the first N seeds per instance-class
    #[arg(long = "max-samples", value_name = "N")]
    pub max_samples: Option<usize>,

    /// Value substituted for unsolved instance-classes
    #[arg(long = "penalty", value_name = "VALUE", conflicts_with = "time_budget")]
    pub penalty: Option<f64>,

    /// Derive the penalty from the per-run time budget
    #[arg(long = "time-budget", value_name = "SECONDS")]
    pub time_budget: Option<f64>,

    /// Leave classes solved below this value out of the plotted points
    #[arg(long = "noise-floor-plot", value_name = "VALUE")]
    pub noise_floor_plot: Option<f64>,

    /// Leave classes solved below this value out of the significance test
    #[arg(long = "noise-floor-test", value_name = "VALUE")]
    pub noise_floor_test: Option<f64>,

    /// Analyse only the instances every configuration ran
    #[arg(long = "intersect")]
    pub intersect: bool,

    /// Aggregate cache file
    #[arg(long = "cache", value_name = "FILE", conflicts_with = "no_cache")]
    pub cache: Option<PathBuf>,

    /// Ignore any cache file
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Print the per-configuration aggregate tables (text format)
    #[arg(short = 'a', long = "aggregates")]
    pub aggregates: bool,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,

    /// Run tables (CSV)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut AnalysisConfig) -> Result<()> {
        if let Some(n) = self.min_samples {
            config.aggregation.min_samples = n;
        }
        if let Some(n) = self.max_samples {
            config.aggregation.max_samples = Some(n);
        }
        if let Some(penalty) = self.penalty {
            config.comparison.penalty = Some(penalty);
            config.comparison.time_budget = None;
        }
        if let Some(budget) = self.time_budget {
            config.comparison.penalty = None;
            config.comparison.time_budget = Some(budget);
        }
        if self.noise_floor_plot.is_some() {
            config.comparison.noise_floor_plot = self.noise_floor_plot;
        }
        if self.noise_floor_test.is_some() {
            config.comparison.noise_floor_test = self.noise_floor_test;
        }
        if self.intersect {
            config.universe = UniversePolicy::Intersect;
        }
        if !self.compare.is_empty() {
            config.comparisons = self
                .compare
                .iter()
                .map(|spec| ComparisonSpec::parse(spec))
                .collect::<Result<Vec<_>>>()?;
        }
        config.validate()
    }

    /// Sources from the configuration file followed by the command line
    pub fn record_sources(&self, config: &AnalysisConfig) -> Vec<RecordSource> {
        let mut sources = config.record_sources();
        sources.extend(self.sources.iter().map(|s| RecordSource::from_spec(s)));
        sources.extend(self.files.iter().map(RecordSource::file));
        sources
    }

    /// Cache path in effect, if any
    pub fn cache_path(&self) -> Option<&PathBuf> {
        if self.no_cache {
            None
        } else {
            self.cache.as_ref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ConfigLabel;

    #[test]
    fn test_cli_parses_files() {
        let cli = Cli::parse_from(["runcompare", "a.csv", "b.csv"]);
        assert_eq!(cli.files.len(), 2);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_repeatable_sources_and_comparisons() {
        let cli = Cli::parse_from([
            "runcompare",
            "--source",
            "0=enc0/runs.csv",
            "-s",
            "enc1/runs.csv",
            "--compare",
            "0:1",
            "-x",
            "1:2",
        ]);
        assert_eq!(cli.sources.len(), 2);
        assert_eq!(cli.compare, vec!["0:1", "1:2"]);

        let sources = cli.record_sources(&AnalysisConfig::default());
        assert_eq!(sources[0].config_override, Some(ConfigLabel::new("0")));
        assert_eq!(sources[1].config_override, None);
    }

    #[test]
    fn test_cli_format_json() {
        let cli = Cli::parse_from(["runcompare", "--format", "json", "a.csv"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_penalty_conflicts_with_time_budget() {
        let result = Cli::try_parse_from([
            "runcompare",
            "--penalty",
            "1e6",
            "--time-budget",
            "600",
            "a.csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_cache_conflicts_with_no_cache() {
        assert!(Cli::try_parse_from(["runcompare", "--cache", "x.mp", "--no-cache"]).is_err());
        let cli = Cli::parse_from(["runcompare", "--no-cache"]);
        assert_eq!(cli.cache_path(), None);
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "runcompare",
            "--min-samples",
            "10",
            "--max-samples",
            "10",
            "--time-budget",
            "600",
            "--noise-floor-plot",
            "500",
            "--intersect",
            "--compare",
            "0|2:1|2",
        ]);
        let mut config = AnalysisConfig::default();
        cli.apply_overrides(&mut config).unwrap();

        assert_eq!(config.aggregation.min_samples, 10);
        assert_eq!(config.aggregation.max_samples, Some(10));
        assert_eq!(config.comparison.penalty, None);
        assert_eq!(config.comparison.resolved_penalty().unwrap(), 600_000.0);
        assert_eq!(config.comparison.noise_floor_plot, Some(500.0));
        assert_eq!(config.universe, UniversePolicy::Intersect);
        assert_eq!(config.comparisons[0].b, ConfigLabel::new("1|2"));
    }

    #[test]
    fn test_overrides_are_validated() {
        let cli = Cli::parse_from(["runcompare", "--min-samples", "0"]);
        let mut config = AnalysisConfig::default();
        assert!(cli.apply_overrides(&mut config).is_err());

        let cli = Cli::parse_from(["runcompare", "--compare", "nocolon"]);
        assert!(cli.apply_overrides(&mut AnalysisConfig::default()).is_err());
    }

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let cli = Cli::parse_from(["runcompare"]);
        let mut config = AnalysisConfig::strict();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config, AnalysisConfig::strict());
    }
}
