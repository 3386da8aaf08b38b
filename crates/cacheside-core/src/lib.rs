//! # cacheside-core
//!
//! Typed cache-aside layer over a key-value backend.
//!
//! ## Overview
//!
//! - [`KeyValueBackend`]: raw string get/set/delete/scan/multi-get
//! - [`NullBackend`]: disables caching without touching caller code
//! - [`MemoryBackend`]: in-process backend (local mode and tests)
//! - [`TypedCache`]: namespaced, serialized access to one entity type
//! - [`BatchLoader`]: reads a batch through the cache, falling back to a
//!   [`ListRepository`] for misses with a single round trip each way
//!
//! ## Example
//!
//! ```ignore
//! use cacheside_core::{load_cacheable_list, MemoryBackend, TypedCache};
//! use tokio_util::sync::CancellationToken;
//!
//! let cache = TypedCache::<Patient>::for_type(Arc::new(MemoryBackend::new()))?;
//! let ctx = CancellationToken::new();
//!
//! let patients = load_cacheable_list(&ctx, &ids, &patient_repository, &cache).await?;
//! for (id, patient) in patients {
//!     match patient {
//!         Some(p) => println!("{id}: {}", p.name),
//!         None => println!("{id}: not found"),
//!     }
//! }
//! ```

pub mod backend;
pub mod codec;
mod error;
pub mod loader;
pub mod memory;
pub mod metrics;
pub mod namespace;
pub mod null;
pub mod typed;

use std::collections::HashMap;

pub use backend::{DynBackend, KeyValueBackend, RawEntries, cancellable, ensure_active};
pub use codec::{Codec, CodecError};
pub use error::{CacheError, ErrorCategory, SourceError};
pub use loader::{BatchLoader, ListRepository, LoadReport, load_cacheable_list};
pub use memory::MemoryBackend;
pub use namespace::{Cacheable, KEY_SEPARATOR, Namespace};
pub use null::NullBackend;
pub use typed::TypedCache;

/// Type alias for a cache result.
pub type CacheResult<T> = Result<T, CacheError>;

/// One entry per requested id; `None` when the value was found nowhere.
pub type ResultMap<T> = HashMap<String, Option<T>>;

pub use tokio_util::sync::CancellationToken;
