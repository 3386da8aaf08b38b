//! Key namespaces.
//!
//! ## Cache Key Format
//!
//! `{namespace}:{id}`, e.g. `patient:123`

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheResult;
use crate::error::CacheError;

/// Separator between namespace and identifier.
pub const KEY_SEPARATOR: char = ':';

/// Lowercased key prefix isolating one entity kind inside a shared backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(Arc<str>);

impl Namespace {
    /// Validates and lowercases `name`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidNamespace` if `name` is blank or contains
    /// the key separator.
    pub fn new(name: impl AsRef<str>) -> CacheResult<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() || name.contains(KEY_SEPARATOR) {
            return Err(CacheError::invalid_namespace(name));
        }
        Ok(Self(Arc::from(name.to_lowercase())))
    }

    /// Namespace declared by the entity type itself.
    pub fn of<T: Cacheable>() -> CacheResult<Self> {
        Self::new(T::NAMESPACE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the backend key for `id`.
    #[inline]
    pub fn key(&self, id: &str) -> String {
        format!("{}{KEY_SEPARATOR}{id}", self.0)
    }

    /// Returns the identifier part of `key` if it belongs to this namespace.
    ///
    /// Only the leading `namespace:` is stripped, so identifiers may contain
    /// the separator themselves.
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.as_str())?.strip_prefix(KEY_SEPARATOR)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity types that name their own namespace.
///
/// ```ignore
/// impl Cacheable for Patient {
///     const NAMESPACE: &'static str = "patient";
/// }
///
/// let cache = TypedCache::<Patient>::for_type(backend)?;
/// ```
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAMESPACE: &'static str;
}
