//! Aggregate cache
//!
//! Persists the aggregate tables of an analysis as a MessagePack blob so
//! repeated runs over the same sources skip loading and aggregation. The key
//! covers the schema, the aggregation settings and the byte content of every
//! source. Invalidation is by source identity only: there is no expiry.
//!
//! The blob is not portable across crate versions; a version or key mismatch
//! is a cache miss, never an error.

use crate::aggregate::{AggregateSet, AggregationOptions};
use crate::error::{AnalysisError, Result};
use crate::loader::LoadedSource;
use crate::reconcile::UniversePolicy;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Bump when the serialized layout of `AggregateSet` changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    format_version: u32,
    crate_version: String,
    key: String,
    aggregates: AggregateSet,
}

/// Identity of everything that determines the aggregate tables
#[derive(Serialize)]
struct KeyMaterial<'a> {
    schema: &'a Schema,
    aggregation: &'a AggregationOptions,
    universe: UniversePolicy,
    sources: Vec<SourceIdentity>,
}

#[derive(Serialize)]
struct SourceIdentity {
    name: String,
    config_override: Option<String>,
    content_sha256: String,
}

/// File-backed cache of one analysis' aggregates
#[derive(Debug, Clone)]
pub struct AggregateCache {
    path: PathBuf,
}

impl AggregateCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex SHA-256 cache key over the bytes that will be parsed
    pub fn key(
        schema: &Schema,
        aggregation: &AggregationOptions,
        universe: UniversePolicy,
        sources: &[LoadedSource],
    ) -> Result<String> {
        let sources = sources
            .iter()
            .map(|loaded| SourceIdentity {
                name: loaded.source.name.clone(),
                config_override: loaded.source.config_override.as_ref().map(|c| c.to_string()),
                content_sha256: hex::encode(Sha256::digest(&loaded.bytes)),
            })
            .collect();

        let material = KeyMaterial {
            schema,
            aggregation,
            universe,
            sources,
        };
        let encoded = serde_json::to_vec(&material)
            .map_err(|e| AnalysisError::Config(format!("cannot encode cache key: {}", e)))?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    /// Read the cached aggregates for `key`, if present and current
    pub fn load(&self, key: &str) -> Option<AggregateSet> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no cache blob");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "cannot read cache: {}", e);
                return None;
            }
        };

        let envelope: CacheEnvelope = match rmp_serde::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "discarding corrupt cache: {}", e);
                return None;
            }
        };

        if envelope.format_version != CACHE_FORMAT_VERSION
            || envelope.crate_version != env!("CARGO_PKG_VERSION")
        {
            tracing::info!(
                found = envelope.format_version,
                expected = CACHE_FORMAT_VERSION,
                "cache written by another version"
            );
            return None;
        }
        if envelope.key != key {
            tracing::info!("sources or settings changed since the cache was written");
            return None;
        }

        tracing::info!(path = %self.path.display(), "loaded aggregates from cache");
        Some(envelope.aggregates)
    }

    /// Write the aggregates for `key`, replacing any previous blob
    pub fn store(&self, key: &str, aggregates: &AggregateSet) -> Result<()> {
        let envelope = CacheEnvelope {
            format_version: CACHE_FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            key: key.to_string(),
            aggregates: aggregates.clone(),
        };
        let bytes = rmp_serde::to_vec(&envelope).map_err(|e| AnalysisError::Cache {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        tracing::info!(path = %self.path.display(), bytes = bytes.len(), "saved aggregates to cache");
        Ok(())
    }
}
