//! Deterministic cache key derivation.
//!
//! Keys are the join point between the store and the cache: the write and
//! read paths must derive byte-identical strings from the same identity.
//! Both builders are pure functions of their inputs, and the entity type
//! name is embedded so keys never collide across types.

use tandem_core::EntityId;

/// Cache key for a single entity.
///
/// The identity is rendered as canonical decimal (no leading zeros, no
/// locale formatting), so the same identity always yields the same key.
pub fn entity_key(prefix: &str, entity_name: &str, id: EntityId) -> String {
    format!("{prefix}_entity_{entity_name}_id_{id}")
}

/// Cache key for a table's cached row count.
pub fn total_rows_key(prefix: &str, table: &str) -> String {
    format!("{prefix}_total_rows_{table}")
}
