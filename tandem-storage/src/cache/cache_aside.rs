//! Cache-aside orchestration across the relational store and the cache.
//!
//! The orchestrator owns the ordering of store and cache effects per
//! operation: insert writes the store first and writes through to the
//! cache; reads try the cache and backfill from the store on a miss;
//! update and delete mutate the store first and then invalidate. Cache
//! read failures are absorbed and degrade to a store read; cache write
//! failures after a committed store mutation are surfaced as
//! partial-success errors naming the affected key.
//!
//! # Concurrency
//!
//! The orchestrator is stateless and reentrant; operations for different
//! identities are fully independent, and same-identity write-write
//! ordering is left to the store's row-level concurrency control. Two
//! concurrent read misses may both backfill (idempotent, last-write-wins
//! on the key). A read racing an invalidating update can repopulate the
//! cache with pre-update data; that window is bounded by the TTL.

use std::sync::Arc;
use std::time::Duration;

use tandem_core::{
    resolve_identity, CacheError, Entity, EntityId, FieldAssignment, TandemError, TandemResult,
};
use tracing::{debug, warn};

use super::keys;
use super::projector::HashPatch;
use super::traits::CacheStore;
use crate::store::RelationalStore;

// ============================================================================
// BINDINGS
// ============================================================================

/// Per-call binding of a table to its cache key namespace and TTL.
#[derive(Debug, Clone)]
pub struct Binding<'a> {
    /// Relational table name.
    pub table: &'a str,
    /// Prefix for every cache key derived for this table.
    pub key_prefix: &'a str,
    /// Time-to-live for cache entries written by the operation.
    pub ttl: Duration,
}

impl<'a> Binding<'a> {
    /// Create a binding.
    pub fn new(table: &'a str, key_prefix: &'a str, ttl: Duration) -> Self {
        Self {
            table,
            key_prefix,
            ttl,
        }
    }

    /// Create a binding for `table` with the config's defaults.
    pub fn from_config(config: &'a BindingConfig, table: &'a str) -> Self {
        Self {
            table,
            key_prefix: &config.key_prefix,
            ttl: config.default_ttl,
        }
    }
}

/// Process-level defaults for bindings.
///
/// Per-call [`Binding`] values remain the source of truth; this only
/// centralizes the prefix and TTL a process wants to use throughout.
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// Default cache key prefix.
    pub key_prefix: String,
    /// Default TTL for cache entries.
    pub default_ttl: Duration,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            key_prefix: "tandem".to_string(),
            default_ttl: Duration::from_secs(60),
        }
    }
}

impl BindingConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Read the config from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            key_prefix: std::env::var("TANDEM_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            default_ttl: std::env::var("TANDEM_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_ttl),
        }
    }
}

// ============================================================================
// READ RESULTS
// ============================================================================

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from the cache without touching the store.
    Cache,
    /// Served from the relational store.
    Store,
}

/// Result of a read, carrying its source and any non-fatal cache trouble.
#[derive(Debug, Clone)]
pub struct EntityRead<T> {
    value: T,
    source: ReadSource,
    warning: Option<CacheError>,
}

impl<T> EntityRead<T> {
    fn from_cache(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Cache,
            warning: None,
        }
    }

    fn from_store(value: T, warning: Option<CacheError>) -> Self {
        Self {
            value,
            source: ReadSource::Store,
            warning,
        }
    }

    /// Get a reference to the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consume the wrapper and return the value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Which layer served the read.
    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// Check if this read was a cache hit.
    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }

    /// Non-fatal cache-layer failure encountered while serving the read:
    /// an absorbed cache read error, or a failed backfill. The value
    /// itself is correctly sourced in either case.
    pub fn warning(&self) -> Option<&CacheError> {
        self.warning.as_ref()
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Cache-aside orchestrator over a relational store and a cache store.
///
/// The store is the source of truth; the cache holds TTL-bounded copies.
/// Table name, key prefix and TTL are supplied per call via [`Binding`].
pub struct CacheAside<S, C>
where
    S: RelationalStore,
    C: CacheStore,
{
    store: Arc<S>,
    cache: Arc<C>,
}

impl<S, C> CacheAside<S, C>
where
    S: RelationalStore,
    C: CacheStore,
{
    /// Create a new orchestrator.
    pub fn new(store: Arc<S>, cache: Arc<C>) -> Self {
        Self { store, cache }
    }

    /// Get a reference to the relational store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the cache store.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Insert a batch of entities and write each through to the cache.
    ///
    /// The store insert commits or fails as a whole before any cache
    /// write. Cache writes then happen per entity in order; the first
    /// failure returns [`TandemError::CacheWrite`] immediately, leaving
    /// the remaining entities uncached until read backfill repairs them
    /// on demand.
    pub async fn insert<T: Entity>(
        &self,
        binding: &Binding<'_>,
        id_field: &str,
        entities: &[T],
    ) -> TandemResult<()> {
        if entities.is_empty() {
            return Err(TandemError::EmptyBatch);
        }

        self.store.insert_batch(binding.table, entities).await?;

        for entity in entities {
            let id = resolve_identity(entity, id_field)?;
            let key = keys::entity_key(binding.key_prefix, T::entity_name(), id);
            if let Err(source) = self.cache.put_entity(&key, entity, binding.ttl).await {
                return Err(TandemError::CacheWrite { key, source });
            }
        }
        Ok(())
    }

    /// Get an entity by identity, cache first.
    ///
    /// A cache read error is absorbed and the call degrades to a plain
    /// store read (no backfill); the absorbed error is carried as the
    /// read's warning. On a clean miss the store row is backfilled into
    /// the cache, and a backfill failure is likewise carried as a
    /// warning alongside the returned row, never in place of it.
    pub async fn get_by_id<T: Entity>(
        &self,
        binding: &Binding<'_>,
        id: EntityId,
    ) -> TandemResult<Option<EntityRead<T>>> {
        let key = keys::entity_key(binding.key_prefix, T::entity_name(), id);

        match self.cache.fetch_entity::<T>(&key).await {
            Ok(Some(entity)) => Ok(Some(EntityRead::from_cache(entity))),
            Ok(None) => {
                let Some(entity) = self.store.fetch_by_id::<T>(binding.table, id).await? else {
                    return Ok(None);
                };
                let warning = self
                    .cache
                    .put_entity(&key, &entity, binding.ttl)
                    .await
                    .err();
                if let Some(e) = &warning {
                    debug!(key = %key, error = %e, "backfill failed, returning store row");
                }
                Ok(Some(EntityRead::from_store(entity, warning)))
            }
            Err(e) => {
                debug!(key = %key, error = %e, "cache read failed, falling back to store");
                let Some(entity) = self.store.fetch_by_id::<T>(binding.table, id).await? else {
                    return Ok(None);
                };
                Ok(Some(EntityRead::from_store(entity, Some(e))))
            }
        }
    }

    /// Delete an entity by identity from both layers, store first.
    ///
    /// Returns `Ok(false)` when no row was affected (no cache
    /// interaction). When the store delete commits but the cache
    /// invalidation fails, the call returns
    /// [`TandemError::CacheInvalidate`]: the row is gone from the store
    /// and the stale cache entry survives at most until its TTL.
    pub async fn delete_by_id<T: Entity>(
        &self,
        binding: &Binding<'_>,
        id: EntityId,
    ) -> TandemResult<bool> {
        let affected = self.store.delete_by_id(binding.table, id).await?;
        if affected == 0 {
            return Ok(false);
        }

        let key = keys::entity_key(binding.key_prefix, T::entity_name(), id);
        if let Err(source) = self.cache.delete(&key).await {
            return Err(TandemError::CacheInvalidate { key, source });
        }
        Ok(true)
    }

    /// Partially update an entity by identity and invalidate its cache
    /// slot.
    ///
    /// The store computes the realized `(field, value)` assignments; an
    /// empty realized list means nothing changed and no cache action is
    /// taken. Otherwise the cache entry is deleted rather than patched:
    /// the store projection may include server-computed columns the
    /// caller's values do not carry, so forcing a re-fetch on the next
    /// read is the correctness-preserving choice for the full-entity key.
    /// An invalidation failure after the committed update returns
    /// [`TandemError::CacheInvalidate`].
    pub async fn update_by_id<T: Entity>(
        &self,
        binding: &Binding<'_>,
        id: EntityId,
        entity: &T,
        fields: &[&str],
    ) -> TandemResult<Vec<FieldAssignment>> {
        let realized = self
            .store
            .update_by_id(binding.table, id, entity, fields)
            .await?;
        if realized.is_empty() {
            return Ok(realized);
        }

        let key = keys::entity_key(binding.key_prefix, T::entity_name(), id);
        if let Err(source) = self.cache.delete(&key).await {
            return Err(TandemError::CacheInvalidate { key, source });
        }
        Ok(realized)
    }

    /// Total row count for the binding's table, cached with the
    /// binding's TTL.
    ///
    /// A corrupt cached value (one that does not parse as an integer) is
    /// deleted and recomputed. Populating the cache is best-effort: the
    /// computed count is returned whether or not the cache write
    /// succeeds.
    pub async fn total_rows(&self, binding: &Binding<'_>) -> TandemResult<i64> {
        let key = keys::total_rows_key(binding.key_prefix, binding.table);

        match self.cache.fetch_value(&key).await {
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(total) => return Ok(total),
                Err(_) => {
                    warn!(key = %key, value = %raw, "corrupt cached row count, discarding");
                    if let Err(e) = self.cache.delete(&key).await {
                        warn!(key = %key, error = %e, "failed to discard corrupt row count");
                    }
                }
            },
            Ok(None) => {}
            Err(e) => {
                debug!(key = %key, error = %e, "cache read failed, counting from store");
            }
        }

        let total = self.store.count_rows(binding.table).await?;
        if let Err(e) = self.cache.put_value(&key, &total.to_string(), binding.ttl).await {
            warn!(key = %key, error = %e, "failed to cache row count");
        }
        Ok(total)
    }

    /// Patch a cached document in place by key.
    ///
    /// The alternative to invalidate-on-update for callers that already
    /// hold the field-level diff and address the cache representation
    /// directly. The patch is atomic at the document level: any
    /// per-field failure discards the whole representation and returns
    /// [`TandemError::CachePatch`] naming every failed field.
    pub async fn update_entity(
        &self,
        key: &str,
        fields: &[FieldAssignment],
        ttl: Option<Duration>,
    ) -> TandemResult<()> {
        let mut patch = HashPatch::new(key, fields);
        if let Some(ttl) = ttl {
            patch = patch.with_ttl(ttl);
        }
        patch
            .apply(self.cache.as_ref())
            .await
            .map_err(|source| TandemError::CachePatch {
                key: key.to_string(),
                source,
            })
    }
}

impl<S, C> Clone for CacheAside<S, C>
where
    S: RelationalStore,
    C: CacheStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
        }
    }
}
