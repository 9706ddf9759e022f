//! In-memory cache backend.
//!
//! A TTL-aware document store standing in for the production key-value
//! cache. Expiry is enforced lazily: an entry past its deadline is
//! dropped by the next read that touches it. Hit/miss statistics are
//! tracked the same way for entity and scalar reads.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use tandem_core::{CacheError, Entity, FieldAssignment, FieldFailure};
use tokio::sync::RwLock;

use super::traits::{CacheStats, CacheStore};

struct Entry {
    value: JsonValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// In-memory cache store.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    stats: RwLock<CacheStats>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Snapshot of usage statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut stats = self.stats.read().await.clone();
        stats.entry_count = entries.len() as u64;
        stats
    }

    /// Read the live value at `key`, dropping it if expired.
    async fn read_live(&self, key: &str) -> Option<JsonValue> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;
        match entries.get(key) {
            Some(entry) if entry.live(Instant::now()) => {
                stats.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                stats.expirations += 1;
                stats.misses += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn put_entity<T: Entity>(
        &self,
        key: &str,
        entity: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(entity).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn fetch_entity<T: Entity>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(value) = self.read_live(key).await else {
            return Ok(None);
        };
        let entity = serde_json::from_value(value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(entity))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn put_value(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: JsonValue::from(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn fetch_value(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.read_live(key).await {
            None => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s)),
            Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(CacheError::Protocol {
                key: key.to_string(),
                reason: "value at key is not a scalar".to_string(),
            }),
        }
    }

    async fn apply_fields(
        &self,
        key: &str,
        fields: &[FieldAssignment],
        ttl: Option<Duration>,
    ) -> Result<Vec<FieldFailure>, CacheError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let expired = entries.get(key).is_some_and(|entry| !entry.live(now));
        if expired {
            entries.remove(key);
            self.stats.write().await.expirations += 1;
        }

        // Reject the whole batch before touching the document.
        if let Some(entry) = entries.get(key) {
            if !entry.value.is_object() {
                return Ok(fields
                    .iter()
                    .map(|f| FieldFailure {
                        field: f.name.clone(),
                        reason: "value at key is not a field document".to_string(),
                    })
                    .collect());
            }
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: JsonValue::Object(Map::new()),
            expires_at: None,
        });
        if let JsonValue::Object(doc) = &mut entry.value {
            for field in fields {
                doc.insert(field.name.clone(), field.value.to_json());
            }
        }
        if let Some(ttl) = ttl {
            entry.expires_at = Some(now + ttl);
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{make_demo, DemoEntity};

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_entity_roundtrip() {
        let cache = MemoryCache::new();
        let demo = make_demo(1, "tdj", 1);

        cache.put_entity("k", &demo, TTL).await.unwrap();
        let found: DemoEntity = cache.fetch_entity("k").await.unwrap().unwrap();
        assert_eq!(found, demo);

        let missing: Option<DemoEntity> = cache.fetch_entity("absent").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let cache = MemoryCache::new();
        cache
            .put_entity("k", &make_demo(1, "tdj", 1), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let found: Option<DemoEntity> = cache.fetch_entity("k").await.unwrap();
        assert!(found.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_scalar_roundtrip() {
        let cache = MemoryCache::new();
        cache.put_value("count", "42", TTL).await.unwrap();
        assert_eq!(cache.fetch_value("count").await.unwrap().unwrap(), "42");
        assert!(cache.fetch_value("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scalar_read_of_document_is_protocol_error() {
        let cache = MemoryCache::new();
        cache
            .put_entity("k", &make_demo(1, "tdj", 1), TTL)
            .await
            .unwrap();
        let err = cache.fetch_value("k").await.unwrap_err();
        assert!(matches!(err, CacheError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = MemoryCache::new();
        cache.put_value("k", "1", TTL).await.unwrap();
        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.fetch_value("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_fields_patches_cached_document() {
        let cache = MemoryCache::new();
        let mut demo = make_demo(1, "old", 1);
        cache.put_entity("k", &demo, TTL).await.unwrap();

        let failures = cache
            .apply_fields(
                "k",
                &[
                    FieldAssignment::new("name", "new"),
                    FieldAssignment::new("status", 2i64),
                ],
                Some(TTL),
            )
            .await
            .unwrap();
        assert!(failures.is_empty());

        demo.name = "new".to_string();
        demo.status = 2;
        let found: DemoEntity = cache.fetch_entity("k").await.unwrap().unwrap();
        assert_eq!(found, demo);
    }

    #[tokio::test]
    async fn test_apply_fields_creates_missing_document() {
        let cache = MemoryCache::new();
        let failures = cache
            .apply_fields("k", &[FieldAssignment::new("name", "x")], None)
            .await
            .unwrap();
        assert!(failures.is_empty());
        assert_eq!(cache.stats().await.entry_count, 1);
    }

    #[tokio::test]
    async fn test_apply_fields_rejects_non_document_value() {
        let cache = MemoryCache::new();
        cache.put_value("k", "scalar", TTL).await.unwrap();

        let failures = cache
            .apply_fields(
                "k",
                &[
                    FieldAssignment::new("name", "x"),
                    FieldAssignment::new("status", 1i64),
                ],
                None,
            )
            .await
            .unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].field, "name");
        assert_eq!(failures[1].field, "status");

        // The scalar is untouched.
        assert_eq!(cache.fetch_value("k").await.unwrap().unwrap(), "scalar");
    }

    #[tokio::test]
    async fn test_apply_fields_refreshes_ttl() {
        let cache = MemoryCache::new();
        cache
            .put_value("k", "v", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // The scalar has expired, so the patch starts a fresh document.
        let failures = cache
            .apply_fields(
                "k",
                &[FieldAssignment::new("name", "x")],
                Some(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        assert!(failures.is_empty());

        let value = cache.read_live("k").await.unwrap();
        assert!(value.is_object());
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let cache = MemoryCache::new();
        cache.put_value("k", "1", TTL).await.unwrap();

        cache.fetch_value("k").await.unwrap();
        cache.fetch_value("k").await.unwrap();
        cache.fetch_value("absent").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 0.001);
    }
}
