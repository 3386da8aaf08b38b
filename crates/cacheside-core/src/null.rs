//! No-op backend that disables caching.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::CacheResult;
use crate::backend::{KeyValueBackend, RawEntries};

/// Backend that stores nothing.
///
/// Every read misses, every write and delete succeeds without effect, and no
/// keys are ever listed. Swapping it in turns a cache-aside call path into a
/// plain source-of-truth read without changing caller code.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KeyValueBackend for NullBackend {
    async fn get_raw(&self, _ctx: &CancellationToken, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set_raw(
        &self,
        _ctx: &CancellationToken,
        _key: &str,
        _value: &str,
        _ttl: Option<Duration>,
    ) -> CacheResult<()> {
        Ok(())
    }

    async fn delete_raw(&self, _ctx: &CancellationToken, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn multi_get_raw(
        &self,
        _ctx: &CancellationToken,
        keys: &[String],
    ) -> CacheResult<RawEntries> {
        Ok(keys.iter().map(|key| (key.clone(), None)).collect())
    }

    async fn list_all_keys(&self, _ctx: &CancellationToken) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn backend_name(&self) -> &'static str {
        "null"
    }
}
