//! # cacheside
//!
//! Cache-aside batch loading over Redis.
//!
//! This crate wires the pieces together for an application: it loads
//! [`AppConfig`], installs logging, and builds the shared backend that every
//! [`TypedCache`] uses. The caching logic itself lives in `cacheside-core`
//! and the Redis client in `cacheside-redis`; both are re-exported here.
//!
//! ```ignore
//! let config = cacheside::config::loader::load_config(None)?;
//! cacheside::observability::init_tracing(&config.logging);
//!
//! let backend = cacheside::create_backend(&config.redis).await;
//! let patients = cacheside::typed_cache::<Patient>(backend, &config.cache)?;
//!
//! let ctx = CancellationToken::new();
//! let found = load_cacheable_list(&ctx, &ids, &repository, &patients).await?;
//! ```

pub mod config;
pub mod observability;

use std::sync::Arc;

pub use cacheside_core::*;
pub use cacheside_redis::{RedisBackend, create_pool};
pub use config::{AppConfig, CacheSettings, ConfigError, LoggingConfig, RedisConfig};
pub use observability::{apply_logging_level, init_tracing, init_tracing_with_level};

/// Create the shared key-value backend from configuration.
///
/// ## Modes
///
/// - **Redis disabled**: returns a [`NullBackend`]; every read misses and
///   every load goes to the source of truth
/// - **Redis enabled**: connects to Redis, falling back to [`NullBackend`]
///   when the pool cannot be created or the server cannot be reached
///
/// The fallback lets an application start and serve from its source of
/// truth while Redis is down.
pub async fn create_backend(config: &RedisConfig) -> DynBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, caching turned off");
        return Arc::new(NullBackend::new());
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let backend = match RedisBackend::from_config(config) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Caching turned off."
            );
            return Arc::new(NullBackend::new());
        }
    };

    if backend.is_available().await {
        tracing::info!("Connected to Redis");
        Arc::new(backend)
    } else {
        tracing::warn!(url = %config.url, "Failed to connect to Redis. Caching turned off.");
        Arc::new(NullBackend::new())
    }
}

/// Build a [`TypedCache`] for `T` with the configured codec and expiry.
pub fn typed_cache<T: Cacheable>(
    backend: DynBackend,
    settings: &CacheSettings,
) -> CacheResult<TypedCache<T>> {
    let cache = TypedCache::for_type(backend)?.with_codec(settings.codec);
    Ok(match settings.default_ttl() {
        Some(ttl) => cache.with_default_ttl(ttl),
        None => cache,
    })
}
