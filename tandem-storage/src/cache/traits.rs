//! Cache store contract and usage statistics.

use std::time::Duration;

use async_trait::async_trait;
use tandem_core::{CacheError, Entity, FieldAssignment, FieldFailure};

/// Cache store contract.
///
/// "Not found" is `Ok(None)`, always distinct from connectivity or
/// protocol failures. Implementations own their connection pooling; every
/// call acquires and releases a connection internally, on every exit path.
///
/// # Serialization
///
/// Entities are stored as serde documents; field-level writes through
/// [`apply_fields`](CacheStore::apply_fields) land on the same document
/// keys a full [`put_entity`](CacheStore::put_entity) would produce.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Write a serialized entity at `key` with a TTL.
    async fn put_entity<T: Entity>(
        &self,
        key: &str,
        entity: &T,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Read a serialized entity at `key`.
    async fn fetch_entity<T: Entity>(&self, key: &str) -> Result<Option<T>, CacheError>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Write a scalar value at `key` with a TTL.
    async fn put_value(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Read a scalar value at `key`.
    async fn fetch_value(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Apply a batched field write to the document at `key`, optionally
    /// refreshing its TTL.
    ///
    /// Returns the per-field failures; an empty vec means every field
    /// applied. `Err` is reserved for failures of the batch as a whole
    /// (connectivity, protocol).
    async fn apply_fields(
        &self,
        key: &str,
        fields: &[FieldAssignment],
        ttl: Option<Duration>,
    ) -> Result<Vec<FieldFailure>, CacheError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped because their TTL had passed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
