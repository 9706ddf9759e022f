//! Error types for tandem operations

use crate::FieldFailure;
use thiserror::Error;

/// Relational-store errors.
///
/// The store is the source of truth, so anything it reports is fatal to
/// the current call. No cache state can compensate for a failed store
/// operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store connection failed: {reason}")]
    Connection { reason: String },

    #[error("query on {table} failed: {reason}")]
    Query { table: String, reason: String },

    #[error("constraint violation on {table}: {reason}")]
    ConstraintViolation { table: String, reason: String },
}

/// Cache-store errors.
///
/// Fatal only where the operation's contract requires a verified cache
/// effect (invalidation after a store mutation, a hash patch). Where the
/// cache is purely an optimization the caller absorbs these and falls
/// back to the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache connection failed: {reason}")]
    Connection { reason: String },

    #[error("cache protocol error on {key}: {reason}")]
    Protocol { key: String, reason: String },

    #[error("cache serialization for {key} failed: {reason}")]
    Serialization { key: String, reason: String },

    #[error("batched field write on {key} failed: {failures:?}")]
    FieldWrite {
        key: String,
        failures: Vec<FieldFailure>,
    },
}

/// Top-level error for cache-aside operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TandemError {
    /// A batch insert was called with zero entities.
    #[error("no entities supplied for insert")]
    EmptyBatch,

    /// Identity resolution failed: the named field is missing at every
    /// nesting level, or is not a 64-bit integer.
    #[error("invalid identity field {field:?}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The relational store failed; nothing was committed by this call.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Write-through after a committed store insert failed. The row is
    /// durable; its cache slot stays absent until read backfill.
    #[error("cache write-through for {key} failed after store commit: {source}")]
    CacheWrite { key: String, source: CacheError },

    /// Invalidation after a committed store mutation failed. The cache
    /// may serve the previous value until its TTL expires.
    #[error("cache invalidation for {key} failed after store commit: {source}")]
    CacheInvalidate { key: String, source: CacheError },

    /// A direct hash patch failed. The cached representation was
    /// discarded rather than left partially patched.
    #[error("cache patch for {key} failed: {source}")]
    CachePatch { key: String, source: CacheError },
}

/// Result type alias for tandem operations.
pub type TandemResult<T> = Result<T, TandemError>;
