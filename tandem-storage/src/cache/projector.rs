//! Partial-update projection onto cached documents.

use std::time::Duration;

use tandem_core::{CacheError, FieldAssignment};
use tracing::warn;

use super::traits::CacheStore;

/// A batched field-set command against one cached document.
///
/// Built from the realized assignments of a partial update and applied as
/// a single batch, optionally refreshing the document's TTL. A patch
/// either applies in full or the document is discarded: a representation
/// with only some of its fields patched is never left behind.
#[derive(Debug, Clone)]
pub struct HashPatch<'a> {
    key: &'a str,
    fields: &'a [FieldAssignment],
    ttl: Option<Duration>,
}

impl<'a> HashPatch<'a> {
    /// Create a patch for `key` covering exactly `fields`.
    pub fn new(key: &'a str, fields: &'a [FieldAssignment]) -> Self {
        Self {
            key,
            fields,
            ttl: None,
        }
    }

    /// Refresh the document's TTL along with the patch.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Apply the patch through `cache`.
    ///
    /// On any per-field failure the whole document is deleted and the
    /// returned [`CacheError::FieldWrite`] names every failed field. A
    /// failed discard is logged and the slot is left to heal by TTL.
    pub async fn apply<C: CacheStore + ?Sized>(&self, cache: &C) -> Result<(), CacheError> {
        let failures = cache.apply_fields(self.key, self.fields, self.ttl).await?;
        if failures.is_empty() {
            return Ok(());
        }
        if let Err(e) = cache.delete(self.key).await {
            warn!(key = %self.key, error = %e, "failed to discard partially patched document");
        }
        Err(CacheError::FieldWrite {
            key: self.key.to_string(),
            failures,
        })
    }
}
