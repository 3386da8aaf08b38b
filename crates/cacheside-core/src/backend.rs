//! Raw key-value backend contract.
//!
//! A backend stores opaque string values under opaque string keys. It knows
//! nothing about namespaces or value types; those belong to
//! [`TypedCache`](crate::TypedCache).
//!
//! ## Contract
//!
//! - Missing keys are `None`, never an error.
//! - [`KeyValueBackend::multi_get_raw`] returns an entry for every requested
//!   key in a single round trip.
//! - Any failure is reported as [`CacheError::BackendUnavailable`]; a backend
//!   never fabricates values.
//! - Every operation receives the caller's [`CancellationToken`] and stops with
//!   [`CacheError::Cancelled`] once it fires.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::CacheResult;
use crate::error::CacheError;

/// Raw values keyed by the exact keys that were requested.
pub type RawEntries = HashMap<String, Option<String>>;

/// Key-value store underlying a [`TypedCache`](crate::TypedCache).
///
/// Implementations must be thread-safe; a single instance is shared by every
/// typed cache through [`DynBackend`].
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Reads a single raw value.
    async fn get_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<Option<String>>;

    /// Writes a raw value. `ttl = None` stores it without expiry.
    async fn set_raw(
        &self,
        ctx: &CancellationToken,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<()>;

    /// Removes a key. Removing a missing key succeeds.
    async fn delete_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<()>;

    /// Reads many keys in one round trip.
    ///
    /// The returned map holds an entry, present or absent, for every key in
    /// `keys`.
    async fn multi_get_raw(
        &self,
        ctx: &CancellationToken,
        keys: &[String],
    ) -> CacheResult<RawEntries>;

    /// Lists every key currently stored.
    async fn list_all_keys(&self, ctx: &CancellationToken) -> CacheResult<Vec<String>>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Type alias for a shareable backend instance.
pub type DynBackend = Arc<dyn KeyValueBackend>;

/// Runs `fut` until it completes or `ctx` is cancelled.
///
/// Cancellation wins ties so a cancelled caller never observes a result.
pub async fn cancellable<T, F>(ctx: &CancellationToken, fut: F) -> CacheResult<T>
where
    F: Future<Output = CacheResult<T>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(CacheError::Cancelled),
        result = fut => result,
    }
}

/// Returns `Err(Cancelled)` if the token already fired.
pub fn ensure_active(ctx: &CancellationToken) -> CacheResult<()> {
    if ctx.is_cancelled() {
        Err(CacheError::Cancelled)
    } else {
        Ok(())
    }
}
