//! runcompare - Statistical comparison of solver configurations
//!
//! This library turns per-run benchmark tables (one row per solver
//! invocation) into per-instance-class aggregates and compares pairs of
//! configurations with a penalty-aware log-ratio divergence and a one-sided
//! Mann-Whitney U test.
//!
//! The pipeline is strictly staged: [`loader`] → [`outcome`] →
//! [`reconcile`] → [`aggregate`] → [`compare`], orchestrated by
//! [`pipeline::run_analysis`]. Every stage fails loudly with an
//! [`error::AnalysisError`] rather than dropping data.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod loader;
pub mod outcome;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod schema;
