//! Redis backend for cacheside.
//!
//! Implements [`KeyValueBackend`](cacheside_core::KeyValueBackend) on a
//! `deadpool-redis` connection pool. Keys are stored exactly as the typed
//! cache builds them (`{namespace}:{id}`); this crate adds no prefix of its
//! own.
//!
//! ```ignore
//! use cacheside_redis::{RedisBackend, RedisConfig};
//!
//! let config = RedisConfig {
//!     enabled: true,
//!     url: "redis://localhost:6379".into(),
//!     ..Default::default()
//! };
//! let backend = Arc::new(RedisBackend::from_config(&config)?);
//! let cache = TypedCache::<Patient>::for_type(backend)?;
//! ```

mod backend;
mod config;

pub use backend::{RedisBackend, create_pool};
pub use config::RedisConfig;
