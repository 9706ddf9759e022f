//! Relational store contract and in-memory implementation.
//!
//! The store is the durable side of the consistency pair. The production
//! backend (query execution, SQL dialect, connection pooling) lives behind
//! [`RelationalStore`]; [`MemoryStore`] is the in-crate reference
//! implementation used by tests and local development.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tandem_core::{resolve_identity, Entity, EntityId, FieldAssignment, StoreError};
use tokio::sync::RwLock;

/// Relational store contract.
///
/// "Not found" is `Ok(None)` (or a zero row count), always distinct from
/// connectivity and query failures. Implementations own their connection
/// pooling; every call acquires and releases a connection internally.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Insert a batch of entities into `table`. The batch commits or
    /// fails as a whole.
    async fn insert_batch<T: Entity>(&self, table: &str, entities: &[T])
        -> Result<(), StoreError>;

    /// Fetch a row by identity.
    async fn fetch_by_id<T: Entity>(
        &self,
        table: &str,
        id: EntityId,
    ) -> Result<Option<T>, StoreError>;

    /// Delete a row by identity, returning the number of rows affected.
    async fn delete_by_id(&self, table: &str, id: EntityId) -> Result<u64, StoreError>;

    /// Partially update a row by identity.
    ///
    /// Only the named `fields` are considered; the realized `(field,
    /// value)` assignments actually written are returned. The list is
    /// empty when no named field matched or the row does not exist.
    async fn update_by_id<T: Entity>(
        &self,
        table: &str,
        id: EntityId,
        entity: &T,
        fields: &[&str],
    ) -> Result<Vec<FieldAssignment>, StoreError>;

    /// Count the rows of `table`.
    async fn count_rows(&self, table: &str) -> Result<i64, StoreError>;
}

/// In-memory relational store.
///
/// Rows are JSON documents indexed per table by the identity field the
/// store is constructed with. Entity serde field names double as column
/// names, matching the [`tandem_core::Record`] naming contract.
pub struct MemoryStore {
    id_field: String,
    tables: RwLock<HashMap<String, BTreeMap<EntityId, JsonValue>>>,
}

impl MemoryStore {
    /// Create an empty store indexing rows by `id_field`.
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            tables: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn insert_batch<T: Entity>(
        &self,
        table: &str,
        entities: &[T],
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        // Validate the whole batch before writing any row.
        let mut pending = Vec::with_capacity(entities.len());
        for entity in entities {
            let id = resolve_identity(entity, &self.id_field).map_err(|e| StoreError::Query {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
            if rows.contains_key(&id) || pending.iter().any(|(pid, _)| *pid == id) {
                return Err(StoreError::ConstraintViolation {
                    table: table.to_string(),
                    reason: format!("duplicate id {id}"),
                });
            }
            let doc = serde_json::to_value(entity).map_err(|e| StoreError::Query {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
            pending.push((id, doc));
        }

        rows.extend(pending);
        Ok(())
    }

    async fn fetch_by_id<T: Entity>(
        &self,
        table: &str,
        id: EntityId,
    ) -> Result<Option<T>, StoreError> {
        let tables = self.tables.read().await;
        let Some(doc) = tables.get(table).and_then(|rows| rows.get(&id)) else {
            return Ok(None);
        };
        let entity = serde_json::from_value(doc.clone()).map_err(|e| StoreError::Query {
            table: table.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(entity))
    }

    async fn delete_by_id(&self, table: &str, id: EntityId) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let affected = tables
            .get_mut(table)
            .and_then(|rows| rows.remove(&id))
            .map_or(0, |_| 1);
        Ok(affected)
    }

    async fn update_by_id<T: Entity>(
        &self,
        table: &str,
        id: EntityId,
        entity: &T,
        fields: &[&str],
    ) -> Result<Vec<FieldAssignment>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(doc) = tables.get_mut(table).and_then(|rows| rows.get_mut(&id)) else {
            return Ok(Vec::new());
        };
        let JsonValue::Object(row) = doc else {
            return Err(StoreError::Query {
                table: table.to_string(),
                reason: format!("row {id} is not an object"),
            });
        };

        let mut realized = Vec::new();
        for &field in fields {
            // Fields the new entity does not carry are skipped, not errors.
            if let Some(value) = entity.field(field) {
                row.insert(field.to_string(), value.to_json());
                realized.push(FieldAssignment::new(field, value));
            }
        }
        Ok(realized)
    }

    async fn count_rows(&self, table: &str) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).map_or(0, |rows| rows.len() as i64))
    }
}
