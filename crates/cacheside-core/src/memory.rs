//! In-process backend on top of `DashMap`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::CacheResult;
use crate::backend::{KeyValueBackend, RawEntries, ensure_active};

/// A stored value with optional expiry.
#[derive(Clone, Debug)]
pub struct MemoryEntry {
    pub value: Arc<str>,
    pub stored_at: Instant,
    pub ttl: Option<Duration>,
}

impl MemoryEntry {
    pub fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: Arc::from(value),
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.stored_at.elapsed() > ttl)
    }
}

/// Local, per-process key-value store.
///
/// Expired entries are dropped lazily when they are read or listed. Clones
/// share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones that expired but were not read yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn read(&self, key: &str) -> Option<String> {
        // Check and removal happen under one shard lock so a concurrent write
        // of a fresh value is never deleted.
        if self.entries.remove_if(key, |_, entry| entry.is_expired()).is_some() {
            tracing::debug!(key = %key, "memory entry expired");
            return None;
        }
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.to_string())
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<Option<String>> {
        ensure_active(ctx)?;
        Ok(self.read(key))
    }

    async fn set_raw(
        &self,
        ctx: &CancellationToken,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        ensure_active(ctx)?;
        self.entries.insert(key.to_string(), MemoryEntry::new(value, ttl));
        Ok(())
    }

    async fn delete_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<()> {
        ensure_active(ctx)?;
        self.entries.remove(key);
        Ok(())
    }

    async fn multi_get_raw(
        &self,
        ctx: &CancellationToken,
        keys: &[String],
    ) -> CacheResult<RawEntries> {
        ensure_active(ctx)?;
        Ok(keys.iter().map(|key| (key.clone(), self.read(key))).collect())
    }

    async fn list_all_keys(&self, ctx: &CancellationToken) -> CacheResult<Vec<String>> {
        ensure_active(ctx)?;
        self.entries.retain(|_, entry| !entry.is_expired());
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
