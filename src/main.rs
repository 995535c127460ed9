use anyhow::{Context, Result};
use clap::Parser;
use runcompare::cache::AggregateCache;
use runcompare::cli::{Cli, OutputFormat};
use runcompare::config::AnalysisConfig;
use runcompare::{pipeline, report};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
///
/// Installed when `--debug` is given or `RUST_LOG` is set; logs go to stderr
/// so report output on stdout stays machine-readable.
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml(path)?,
        None => AnalysisConfig::default(),
    };
    args.apply_overrides(&mut config)
        .context("Invalid command-line options")?;

    let sources = args.record_sources(&config);
    if sources.is_empty() {
        anyhow::bail!("No run tables given. Usage: runcompare [--source [LABEL=]PATH]... FILES...");
    }

    let cache = args.cache_path().map(AggregateCache::new);
    let analysis = pipeline::run_analysis(&config, &sources, cache.as_ref())
        .context("Analysis failed")?;

    let output = match args.format {
        OutputFormat::Text => report::render_text(&analysis, args.aggregates),
        OutputFormat::Json => report::render_json(&analysis)?,
        OutputFormat::Csv => report::render_points_csv(&analysis)?,
    };
    print!("{}", output);

    Ok(())
}
