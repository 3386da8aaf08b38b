//! Batch cache-aside loading.
//!
//! ## Flow
//!
//! ```text
//! ids → TypedCache::get_many ──all hit──────────────────────────→ result
//!              │
//!              └─ misses (or cache failure) → ListRepository ──ok──→ merge + write-back → result
//!                                                  │
//!                                                  └─ error ─┬─ no cache hits → Err
//!                                                            └─ some hits    → partial result
//! ```
//!
//! ## Failure Policy
//!
//! - A failed cache read counts as a miss for every id; the source of truth
//!   still serves the request.
//! - A failed source read is returned to the caller only when there are no
//!   cache hits to fall back on. Otherwise the hits are returned and the
//!   failure is reported through [`LoadReport::degraded`].
//! - Write-back failures are logged and ignored.
//!
//! One cache round trip and at most one source round trip per load; no
//! retries at this layer.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::backend::cancellable;
use crate::error::{CacheError, SourceError};
use crate::metrics::{self, SourceOutcome};
use crate::typed::TypedCache;
use crate::{CacheResult, ResultMap};

/// Authoritative lookup consulted on cache misses.
///
/// Ids the repository does not know are simply left out of the returned map;
/// that is not an error.
#[async_trait]
pub trait ListRepository<T>: Send + Sync {
    async fn get_by_id_list(
        &self,
        ctx: &CancellationToken,
        ids: &[String],
    ) -> Result<HashMap<String, T>, SourceError>;
}

/// Result of a load together with how it was served.
#[derive(Debug)]
pub struct LoadReport<T> {
    /// One entry per distinct requested id.
    pub values: ResultMap<T>,
    /// Number of distinct ids requested.
    pub requested: usize,
    /// Ids served from the cache.
    pub cache_hits: usize,
    /// Ids served by the source of truth.
    pub source_hits: usize,
    /// Error that was tolerated while serving this load, if any.
    pub degraded: Option<CacheError>,
}

impl<T> LoadReport<T> {
    /// Returns `true` if a cache or source failure was swallowed.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// Ids that were found nowhere.
    pub fn not_found(&self) -> usize {
        self.requested
            .saturating_sub(self.cache_hits)
            .saturating_sub(self.source_hits)
    }

    pub fn into_values(self) -> ResultMap<T> {
        self.values
    }
}

/// Cache-aside orchestrator over one typed cache and one repository.
///
/// Holds no state of its own; construct one per call site or per request.
pub struct BatchLoader<'a, T, R: ?Sized> {
    cache: &'a TypedCache<T>,
    repository: &'a R,
}

impl<'a, T, R> BatchLoader<'a, T, R>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    R: ListRepository<T> + ?Sized,
{
    pub fn new(cache: &'a TypedCache<T>, repository: &'a R) -> Self {
        Self { cache, repository }
    }

    /// Load `ids`, returning only the values.
    ///
    /// # Errors
    ///
    /// Returns the source-of-truth error when it fails and no id was a cache
    /// hit.
    pub async fn load(
        &self,
        ctx: &CancellationToken,
        ids: &[String],
    ) -> CacheResult<ResultMap<T>> {
        self.load_detailed(ctx, ids).await.map(LoadReport::into_values)
    }

    /// Load `ids` and report how each part was served.
    ///
    /// Duplicate ids are collapsed before the cache read; the first
    /// occurrence decides the order ids are handed to the repository.
    pub async fn load_detailed(
        &self,
        ctx: &CancellationToken,
        ids: &[String],
    ) -> CacheResult<LoadReport<T>> {
        let namespace = self.cache.namespace().as_str();
        let requested = dedup(ids);
        let mut degraded = None;

        let mut values = match self.cache.get_many(ctx, &requested).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    namespace = %namespace,
                    error = %e,
                    "cache read failed, treating batch as a full miss"
                );
                metrics::record_cache_read_failure(namespace);
                degraded = Some(e);
                requested.iter().map(|id| (id.clone(), None)).collect()
            }
        };

        let missing: Vec<String> = requested
            .iter()
            .filter(|id| !matches!(values.get(id.as_str()), Some(Some(_))))
            .cloned()
            .collect();
        let cache_hits = requested.len() - missing.len();
        metrics::record_cache_hits(namespace, cache_hits);
        metrics::record_cache_misses(namespace, missing.len());

        if missing.is_empty() {
            tracing::debug!(namespace = %namespace, hits = cache_hits, "batch served from cache");
            return Ok(LoadReport {
                values,
                requested: requested.len(),
                cache_hits,
                source_hits: 0,
                degraded,
            });
        }

        let loaded = cancellable(ctx, async {
            self.repository
                .get_by_id_list(ctx, &missing)
                .await
                .map_err(CacheError::Source)
        })
        .await;

        let mut found = match loaded {
            Ok(found) => found,
            Err(e) if cache_hits == 0 => {
                metrics::record_source_load(namespace, SourceOutcome::Failed);
                tracing::warn!(
                    namespace = %namespace,
                    missing = missing.len(),
                    error = %e,
                    "source of truth failed with no cache hits"
                );
                return Err(e);
            }
            Err(e) => {
                metrics::record_source_load(namespace, SourceOutcome::Degraded);
                tracing::warn!(
                    namespace = %namespace,
                    hits = cache_hits,
                    missing = missing.len(),
                    error = %e,
                    "source of truth failed, returning cache hits only"
                );
                return Ok(LoadReport {
                    values,
                    requested: requested.len(),
                    cache_hits,
                    source_hits: 0,
                    degraded: Some(e),
                });
            }
        };
        metrics::record_source_load(namespace, SourceOutcome::Success);

        let mut source_hits = 0;
        for id in &missing {
            let Some(value) = found.remove(id) else {
                continue;
            };
            if let Err(e) = self.cache.set(ctx, id, &value).await {
                metrics::record_writeback_failure(namespace);
                tracing::warn!(
                    namespace = %namespace,
                    id = %id,
                    error = %e,
                    "cache write-back failed"
                );
            }
            values.insert(id.clone(), Some(value));
            source_hits += 1;
        }

        tracing::debug!(
            namespace = %namespace,
            requested = requested.len(),
            cache_hits,
            source_hits,
            "batch loaded"
        );

        Ok(LoadReport {
            values,
            requested: requested.len(),
            cache_hits,
            source_hits,
            degraded,
        })
    }
}

/// Load `ids` through `cache`, falling back to `repository` on misses.
///
/// Shorthand for [`BatchLoader::load`].
pub async fn load_cacheable_list<T, R>(
    ctx: &CancellationToken,
    ids: &[String],
    repository: &R,
    cache: &TypedCache<T>,
) -> CacheResult<ResultMap<T>>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    R: ListRepository<T> + ?Sized,
{
    BatchLoader::new(cache, repository).load(ctx, ids).await
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
