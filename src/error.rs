//! Error taxonomy for the analysis pipeline
//!
//! Every variant is fatal for the run that raised it. Nothing in the pipeline
//! recovers locally: a batch analysis that silently drops data produces
//! numbers nobody should trust, so failures surface to the invoker.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, reconciling, aggregating or comparing runs
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A required column is absent from a source
    #[error("source '{source_name}' is missing required column '{column}'")]
    Schema { source_name: String, column: String },

    /// An instance appears more than once where it must be unique
    #[error("duplicate instance {instance} in configuration '{configuration}': {detail}")]
    DuplicateInstance {
        configuration: String,
        instance: String,
        detail: String,
    },

    /// A row whose outcome flag and metric do not fit any outcome class
    #[error("cannot classify row {row} of '{source_name}': flag={flag:?}, metric={metric:?}")]
    AmbiguousOutcome {
        source_name: String,
        row: usize,
        flag: Option<String>,
        metric: Option<f64>,
    },

    /// Fewer repetitions than the configured minimum for an instance-class
    #[error(
        "instance-class {class} in configuration '{configuration}' has {found} usable samples, need {required}"
    )]
    InsufficientSamples {
        configuration: String,
        class: String,
        found: usize,
        required: usize,
    },

    /// Configurations under comparison do not share an instance set
    #[error("instance universe mismatch between '{left}' and '{right}': {detail}")]
    UniverseMismatch {
        left: String,
        right: String,
        detail: String,
    },

    /// Penalty value does not exceed the largest real observation
    #[error("penalty {penalty} must exceed the largest observed value {observed_max}")]
    InvalidPenalty { penalty: f64, observed_max: f64 },

    /// Malformed CSV content
    #[error("{source_name}:{line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    /// Invalid analysis configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Cache blob could not be written
    #[error("cache error at {path}: {message}")]
    Cache { path: PathBuf, message: String },

    /// A statistical routine rejected its input
    #[error("statistics error: {0}")]
    Statistics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
