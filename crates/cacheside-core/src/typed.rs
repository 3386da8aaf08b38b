//! Typed, namespaced view over a raw backend.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::backend::DynBackend;
use crate::codec::Codec;
use crate::error::CacheError;
use crate::namespace::{Cacheable, Namespace};
use crate::{CacheResult, ResultMap};

/// Cache for values of one entity type.
///
/// Built once per entity type and shared across requests; it carries no
/// per-request state. Cloning is cheap and clones share the backend.
pub struct TypedCache<T> {
    backend: DynBackend,
    namespace: Namespace,
    codec: Codec,
    default_ttl: Option<Duration>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCache<T> {
    fn clone(&self) -> Self {
        Self {
            backend: DynBackend::clone(&self.backend),
            namespace: self.namespace.clone(),
            codec: self.codec,
            default_ttl: self.default_ttl,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCache")
            .field("backend", &self.backend.backend_name())
            .field("namespace", &self.namespace)
            .field("codec", &self.codec)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<T: Cacheable> TypedCache<T> {
    /// Create a cache using the namespace declared by `T`.
    pub fn for_type(backend: DynBackend) -> CacheResult<Self> {
        Ok(Self::new(backend, Namespace::of::<T>()?))
    }
}

impl<T> TypedCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Create a JSON-encoded cache with no expiry.
    pub fn new(backend: DynBackend, namespace: Namespace) -> Self {
        Self {
            backend,
            namespace,
            codec: Codec::default(),
            default_ttl: None,
            _marker: PhantomData,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Expiry applied by [`set`](Self::set). Unset means values never expire.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub fn backend(&self) -> &DynBackend {
        &self.backend
    }

    /// Generate the backend key for `id`.
    #[inline]
    pub fn key(&self, id: &str) -> String {
        self.namespace.key(id)
    }

    /// Get a cached value by ID.
    ///
    /// # Errors
    ///
    /// Backend failures and undecodable payloads are returned to the caller.
    pub async fn get(&self, ctx: &CancellationToken, id: &str) -> CacheResult<Option<T>> {
        let key = self.key(id);
        match self.backend.get_raw(ctx, &key).await? {
            Some(raw) => {
                tracing::debug!(key = %key, "cache hit");
                self.decode(id, &raw).map(Some)
            }
            None => {
                tracing::debug!(key = %key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Store a value using the cache's default expiry.
    pub async fn set(&self, ctx: &CancellationToken, id: &str, value: &T) -> CacheResult<()> {
        self.write(ctx, id, value, self.default_ttl).await
    }

    /// Store a value with an explicit expiry.
    pub async fn set_with_ttl(
        &self,
        ctx: &CancellationToken,
        id: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.write(ctx, id, value, Some(ttl)).await
    }

    pub async fn delete(&self, ctx: &CancellationToken, id: &str) -> CacheResult<()> {
        let key = self.key(id);
        self.backend.delete_raw(ctx, &key).await?;
        tracing::debug!(key = %key, "cache entry deleted");
        Ok(())
    }

    /// Identifiers currently stored under this namespace.
    pub async fn ids(&self, ctx: &CancellationToken) -> CacheResult<Vec<String>> {
        let keys = self.backend.list_all_keys(ctx).await?;
        Ok(keys
            .iter()
            .filter_map(|key| self.namespace.strip(key))
            .map(str::to_string)
            .collect())
    }

    /// Read many values in a single backend round trip.
    ///
    /// The result holds one entry per requested id. Each payload is decoded
    /// against the key built from its own id, so the result never depends on
    /// the order in which the backend reports entries.
    ///
    /// # Errors
    ///
    /// Fails as a whole on backend failure, or on the first payload that
    /// cannot be decoded (the error names that id).
    pub async fn get_many(
        &self,
        ctx: &CancellationToken,
        ids: &[String],
    ) -> CacheResult<ResultMap<T>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let raw = self.backend.multi_get_raw(ctx, &keys).await?;

        let mut values = HashMap::with_capacity(ids.len());
        for (id, key) in ids.iter().zip(&keys) {
            let value = match raw.get(key) {
                Some(Some(payload)) => Some(self.decode(id, payload)?),
                _ => None,
            };
            values.insert(id.clone(), value);
        }

        tracing::debug!(
            namespace = %self.namespace,
            requested = ids.len(),
            hits = values.values().filter(|v| v.is_some()).count(),
            "cache batch read"
        );
        Ok(values)
    }

    async fn write(
        &self,
        ctx: &CancellationToken,
        id: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let key = self.key(id);
        let encoded = self
            .codec
            .encode(value)
            .map_err(|e| CacheError::serialization(id, e))?;
        self.backend.set_raw(ctx, &key, &encoded, ttl).await?;
        tracing::debug!(key = %key, ttl_secs = ?ttl.map(|t| t.as_secs()), "cache set");
        Ok(())
    }

    fn decode(&self, id: &str, raw: &str) -> CacheResult<T> {
        self.codec.decode(raw).map_err(|e| {
            tracing::warn!(
                namespace = %self.namespace,
                id = %id,
                error = %e,
                "Failed to deserialize cached value"
            );
            CacheError::serialization(id, e)
        })
    }
}
