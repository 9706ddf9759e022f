//! Cache layer: key derivation, the cache store contract, an in-memory
//! backend, and the cache-aside orchestrator.
//!
//! # Consistency contract
//!
//! The cache never serves data stale for longer than the caller's TTL,
//! and a successful store mutation is always followed by a cache write or
//! an invalidation. Absence of a cache entry is always a valid state: the
//! orchestrator falls back to the store on any miss or cache error. A
//! single entity's cache slot only ever moves `Absent -> Populated`
//! (insert, backfill, patch) and `Populated -> Absent` (delete,
//! invalidating update, TTL expiry, detected corruption).

pub mod cache_aside;
pub mod keys;
pub mod memory;
pub mod projector;
pub mod traits;

pub use cache_aside::{Binding, BindingConfig, CacheAside, EntityRead, ReadSource};
pub use keys::{entity_key, total_rows_key};
pub use memory::MemoryCache;
pub use projector::HashPatch;
pub use traits::{CacheStats, CacheStore};
