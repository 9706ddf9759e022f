//! Tandem Storage - Cache-Aside Consistency Layer
//!
//! Keeps a key-value cache synchronized with a relational store for
//! individually-addressable entities and for a cached row count. The
//! store is the source of truth; the cache holds TTL-bounded copies that
//! are written through on insert, backfilled on read misses, and
//! invalidated on update and delete.
//!
//! Both collaborators are reached through async traits ([`RelationalStore`]
//! and [`cache::CacheStore`]); in-memory reference implementations live in
//! this crate, production backends behind the traits.

pub mod cache;
pub mod store;

pub use cache::{
    entity_key, total_rows_key, Binding, BindingConfig, CacheAside, CacheStats, CacheStore,
    EntityRead, HashPatch, MemoryCache, ReadSource,
};
pub use store::{MemoryStore, RelationalStore};

#[cfg(test)]
pub(crate) mod fixtures;
