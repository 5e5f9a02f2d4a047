//! Persisted compiled-route cache.
//!
//! # Responsibilities
//! - Write a compiled [`RouteCollection`] to a JSON file
//! - Load it back without re-parsing or re-generating any pattern
//! - Fall back to rebuilding from source on any read problem
//!
//! # Design Decisions
//! - Only route definitions and regex sources are stored; controllers and
//!   middleware are referenced by name and re-resolved at dispatch
//! - Entries carry a format version and a SHA-256 digest of the route
//!   source; either mismatch counts as a miss
//! - Writes go to a sibling temp file and are renamed into place
//! - A broken cache is never an error for the caller of
//!   [`RouteCache::get_or_build`]; it is logged and replaced

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::observability::metrics;
use crate::routing::collection::{CompiledRoute, RouteCollection};
use crate::routing::compiler::{CompileError, CompiledPattern, PatternKind};
use crate::routing::parser::ParsedRoute;
use crate::routing::route::{Route, RouteError};

/// Bumped whenever the on-disk layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file not found")]
    Missing,

    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cache file is not valid: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cache format version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },

    #[error("cache was built from a different route source")]
    Stale,

    #[error("cached pattern no longer compiles: {0}")]
    Pattern(#[from] CompileError),

    #[error("cached routes are inconsistent: {0}")]
    Routes(#[from] RouteError),
}

/// Hex SHA-256 of the route source, used to detect stale caches.
pub fn source_digest(source: &[u8]) -> String {
    hex::encode(Sha256::digest(source))
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    digest: String,
    routes: Vec<CachedRoute>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedRoute {
    route: Route,
    path: CachedPattern,
    host: Option<CachedPattern>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedPattern {
    parsed: ParsedRoute,
    constraints: BTreeMap<String, String>,
    source: String,
}

impl CachedPattern {
    fn from_compiled(pattern: &CompiledPattern) -> Self {
        Self {
            parsed: pattern.parsed().clone(),
            constraints: pattern.constraints().clone(),
            source: pattern.source().to_string(),
        }
    }

    fn restore(self, kind: PatternKind) -> Result<Arc<CompiledPattern>, CompileError> {
        CompiledPattern::from_source(kind, self.parsed, self.constraints, self.source).map(Arc::new)
    }
}

/// File-backed cache of one compiled route collection.
#[derive(Debug, Clone)]
pub struct RouteCache {
    path: PathBuf,
}

impl RouteCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the cache file. Returns false if there was nothing to delete.
    pub fn flush(&self) -> Result<bool, CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Route cache flushed");
                metrics::record_cache_event("flush");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the cache with `collection`, tagged with `digest`.
    pub fn set(&self, collection: &RouteCollection, digest: &str) -> Result<(), CacheError> {
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            digest: digest.to_string(),
            routes: collection
                .iter()
                .map(|compiled| CachedRoute {
                    route: compiled.route().clone(),
                    path: CachedPattern::from_compiled(compiled.path()),
                    host: compiled.host().map(CachedPattern::from_compiled),
                })
                .collect(),
        };
        let bytes = serde_json::to_vec(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        std::fs::write(&staging, bytes)?;
        std::fs::rename(&staging, &self.path)?;

        tracing::debug!(path = %self.path.display(), routes = collection.len(), "Route cache written");
        Ok(())
    }

    /// Load the cached collection if it exists and matches `digest`.
    pub fn get(&self, digest: &str) -> Result<RouteCollection, CacheError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheError::Missing),
            Err(e) => return Err(e.into()),
        };
        let file: CacheFile = serde_json::from_slice(&bytes)?;
        if file.version != CACHE_FORMAT_VERSION {
            return Err(CacheError::Version {
                found: file.version,
                expected: CACHE_FORMAT_VERSION,
            });
        }
        if file.digest != digest {
            return Err(CacheError::Stale);
        }

        let mut routes = Vec::with_capacity(file.routes.len());
        for cached in file.routes {
            let path = cached.path.restore(PatternKind::Path)?;
            let host = cached.host.map(|h| h.restore(PatternKind::Host)).transpose()?;
            routes.push(CompiledRoute::from_parts(cached.route, path, host));
        }
        Ok(RouteCollection::from_compiled(routes)?)
    }

    /// Return the cached collection, or build, persist and return a fresh
    /// one. Only errors from `build` reach the caller.
    pub fn get_or_build<F, E>(&self, digest: &str, build: F) -> Result<RouteCollection, E>
    where
        F: FnOnce() -> Result<RouteCollection, E>,
    {
        match self.get(digest) {
            Ok(collection) => {
                tracing::debug!(path = %self.path.display(), routes = collection.len(), "Route cache hit");
                metrics::record_cache_event("hit");
                return Ok(collection);
            }
            Err(CacheError::Missing) => {
                tracing::debug!(path = %self.path.display(), "Route cache miss");
                metrics::record_cache_event("miss");
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding unusable route cache");
                metrics::record_cache_event("rebuild");
            }
        }

        let collection = build()?;
        if let Err(e) = self.set(&collection, digest) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write route cache");
            metrics::record_cache_event("write_failed");
        }
        Ok(collection)
    }
}
