//! Redis implementation of the key-value contract.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cacheside_core::{CacheError, CacheResult, KeyValueBackend, RawEntries, cancellable};
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, RedisError};
use tokio_util::sync::CancellationToken;

use crate::config::RedisConfig;

/// Build a connection pool from `config`.
///
/// Does not connect; the first connection is opened on demand.
pub fn create_pool(config: &RedisConfig) -> CacheResult<Pool> {
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(config.timeout());
    pool_config.timeouts.create = Some(config.timeout());
    pool_config.timeouts.recycle = Some(config.timeout());
    redis_config.pool = Some(pool_config);

    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| {
            CacheError::backend_unavailable(format!("failed to create Redis pool: {e}"))
        })
}

/// Redis-backed key-value store.
///
/// ## Commands
///
/// | Operation       | Command                            |
/// |-----------------|------------------------------------|
/// | `get_raw`       | `GET`                              |
/// | `set_raw`       | `SET`, or `SET EX` with a TTL      |
/// | `delete_raw`    | `DEL`                              |
/// | `multi_get_raw` | one `MGET` for the whole batch     |
/// | `list_all_keys` | `SCAN MATCH * COUNT n` until done  |
///
/// Every operation checks a connection out of the pool and races the caller's
/// cancellation token.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    scan_count: usize,
}

impl RedisBackend {
    pub const DEFAULT_SCAN_COUNT: usize = 100;

    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            scan_count: Self::DEFAULT_SCAN_COUNT,
        }
    }

    pub fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        Ok(Self::new(create_pool(config)?).with_scan_count(config.scan_count))
    }

    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check if Redis is reachable (for health checks).
    pub async fn is_available(&self) -> bool {
        self.pool.get().await.is_ok()
    }

    async fn connection(&self) -> CacheResult<Connection> {
        self.pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
            CacheError::backend_unavailable(format!("redis pool: {e}"))
        })
    }
}

fn command_error(command: &'static str, key: &str, error: RedisError) -> CacheError {
    tracing::warn!(key = %key, error = %error, "Redis {command} error");
    CacheError::backend_unavailable(format!("redis {command} {key}: {error}"))
}

/// Whole seconds for `SET EX`, rounded up so short TTLs never become 0.
fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn get_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<Option<String>> {
        cancellable(ctx, async {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| command_error("GET", key, e))?;
            tracing::debug!(key = %key, hit = value.is_some(), "redis GET");
            Ok(value)
        })
        .await
    }

    async fn set_raw(
        &self,
        ctx: &CancellationToken,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        cancellable(ctx, async {
            let mut conn = self.connection().await?;
            match ttl {
                Some(ttl) => {
                    let ttl_secs = expiry_secs(ttl);
                    conn.set_ex::<_, _, ()>(key, value, ttl_secs)
                        .await
                        .map_err(|e| command_error("SET", key, e))?;
                    tracing::debug!(key = %key, ttl_secs = %ttl_secs, "redis SET EX");
                }
                None => {
                    conn.set::<_, _, ()>(key, value)
                        .await
                        .map_err(|e| command_error("SET", key, e))?;
                    tracing::debug!(key = %key, "redis SET");
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<()> {
        cancellable(ctx, async {
            let mut conn = self.connection().await?;
            conn.del::<_, ()>(key)
                .await
                .map_err(|e| command_error("DEL", key, e))?;
            tracing::debug!(key = %key, "redis DEL");
            Ok(())
        })
        .await
    }

    async fn multi_get_raw(
        &self,
        ctx: &CancellationToken,
        keys: &[String],
    ) -> CacheResult<RawEntries> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        cancellable(ctx, async {
            let mut conn = self.connection().await?;
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(keys)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error("MGET", &format!("<{} keys>", keys.len()), e))?;

            // MGET answers positionally; a length mismatch means the reply
            // cannot be attributed to keys.
            if values.len() != keys.len() {
                return Err(CacheError::backend_unavailable(format!(
                    "redis MGET returned {} values for {} keys",
                    values.len(),
                    keys.len()
                )));
            }

            tracing::debug!(
                keys = keys.len(),
                hits = values.iter().filter(|v| v.is_some()).count(),
                "redis MGET"
            );
            Ok(keys.iter().cloned().zip(values).collect())
        })
        .await
    }

    async fn list_all_keys(&self, ctx: &CancellationToken) -> CacheResult<Vec<String>> {
        cancellable(ctx, async {
            let mut conn = self.connection().await?;
            let mut keys = Vec::new();
            let mut cursor: u64 = 0;

            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg("*")
                    .arg("COUNT")
                    .arg(self.scan_count)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| command_error("SCAN", "*", e))?;
                keys.extend(batch);

                // Cursor 0 ends the iteration
                if next == 0 {
                    break;
                }
                cursor = next;
            }

            // SCAN may report a key more than once
            keys.sort_unstable();
            keys.dedup();
            Ok(keys)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
