//! Tandem Core - Entity and Field Types
//!
//! Pure data types shared by the storage layer: the entity abstraction,
//! the tagged field-value representation, identity resolution, and the
//! error taxonomy. This crate performs no I/O.

pub mod error;

pub use error::{CacheError, StoreError, TandemError, TandemResult};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier. Identity columns in this domain are 64-bit signed
/// integers assigned by the relational store.
pub type EntityId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// FIELD VALUES
// ============================================================================

/// A typed field value.
///
/// Partial updates and batched cache writes move `(name, value)` pairs
/// between the store and the cache. Restricting values to this closed set
/// keeps their serialization deterministic in both representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// 64-bit signed integer (also the identity type).
    Int(i64),
    /// UTF-8 text.
    Text(String),
    /// UTC timestamp.
    Timestamp(Timestamp),
    /// Boolean flag.
    Bool(bool),
}

impl FieldValue {
    /// Human-readable kind name, used in type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Bool(_) => "boolean",
        }
    }

    /// The JSON form this value takes inside a cached document.
    ///
    /// Matches serde's derived serialization for the corresponding entity
    /// field, so patching a document field-by-field yields the same bytes
    /// a full write-through would.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Text(v) => serde_json::Value::from(v.as_str()),
            Self::Timestamp(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
            Self::Bool(v) => serde_json::Value::from(*v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A realized `(field, value)` assignment.
///
/// The store returns these from a partial update; the cache projector
/// consumes them as elements of a batched field write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAssignment {
    /// Field name, matching the entity's serde field name.
    pub name: String,
    /// The value that was written.
    pub value: FieldValue,
}

impl FieldAssignment {
    /// Create a new field assignment.
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A per-field failure from a batched cache write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    /// The field that failed to apply.
    pub field: String,
    /// What the cache store reported for it.
    pub reason: String,
}

// ============================================================================
// RECORDS AND ENTITIES
// ============================================================================

/// Field lookup over a possibly nested record.
///
/// Entities in this domain often embed a shared base record holding the
/// identity and timestamps. Implementations match their own fields first
/// and delegate to embedded records, in declared order, when the name does
/// not match at the current level. A field at the current level therefore
/// shadows a same-named field in an embedded record, and an embedded
/// identity is found without the caller knowing the embedding structure.
pub trait Record {
    /// Look up a named field, searching embedded records.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> Option<FieldValue> {
        (**self).field(name)
    }
}

impl<R: Record + ?Sized> Record for Box<R> {
    fn field(&self, name: &str) -> Option<FieldValue> {
        (**self).field(name)
    }
}

/// Marker trait for records managed by the cache-aside layer.
///
/// # Implementation Requirements
///
/// - `entity_name()` must be stable: it is embedded in per-entity cache
///   keys and is the join point between the store and cache representations
/// - `Record::field` names must match the serde field names, so partial
///   cache patches land on the same document keys a full write-through uses
pub trait Entity: Record + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type name embedded in per-entity cache keys.
    fn entity_name() -> &'static str;
}

/// Resolve a record's identity value by field name.
///
/// Searches embedded records per the [`Record`] contract. Fails with
/// [`TandemError::InvalidField`] when no field with the given name exists
/// at any nesting level, or when the field is not a 64-bit integer.
pub fn resolve_identity<R>(record: &R, field: &str) -> TandemResult<EntityId>
where
    R: Record + ?Sized,
{
    match record.field(field) {
        Some(FieldValue::Int(id)) => Ok(id),
        Some(other) => Err(TandemError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a 64-bit integer, found {}", other.kind()),
        }),
        None => Err(TandemError::InvalidField {
            field: field.to_string(),
            reason: "no such field at any nesting level".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct BaseRecord {
        id: i64,
        add_time: Timestamp,
        edit_time: Timestamp,
    }

    impl Record for BaseRecord {
        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "id" => Some(FieldValue::Int(self.id)),
                "add_time" => Some(FieldValue::Timestamp(self.add_time)),
                "edit_time" => Some(FieldValue::Timestamp(self.edit_time)),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct DemoEntity {
        #[serde(flatten)]
        base: BaseRecord,
        name: String,
        status: i64,
    }

    impl Record for DemoEntity {
        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "name" => Some(FieldValue::Text(self.name.clone())),
                "status" => Some(FieldValue::Int(self.status)),
                _ => self.base.field(name),
            }
        }
    }

    // A record whose own field shadows one in the embedded base.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ShadowedEntity {
        #[serde(flatten)]
        base: BaseRecord,
        id: i64,
    }

    impl Record for ShadowedEntity {
        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "id" => Some(FieldValue::Int(self.id)),
                _ => self.base.field(name),
            }
        }
    }

    fn make_demo(id: i64) -> DemoEntity {
        DemoEntity {
            base: BaseRecord {
                id,
                add_time: Utc::now(),
                edit_time: Utc::now(),
            },
            name: "tdj".to_string(),
            status: 1,
        }
    }

    #[test]
    fn test_identity_resolved_through_embedded_base() {
        let demo = make_demo(512);
        assert_eq!(resolve_identity(&demo, "id").unwrap(), 512);
    }

    #[test]
    fn test_identity_missing_at_every_level() {
        let demo = make_demo(512);
        let err = resolve_identity(&demo, "uid").unwrap_err();
        assert!(matches!(err, TandemError::InvalidField { ref field, .. } if field == "uid"));
    }

    #[test]
    fn test_identity_type_mismatch() {
        let demo = make_demo(512);
        let err = resolve_identity(&demo, "name").unwrap_err();
        match err {
            TandemError::InvalidField { field, reason } => {
                assert_eq!(field, "name");
                assert!(reason.contains("text"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_current_level_shadows_embedded_field() {
        let shadowed = ShadowedEntity {
            base: BaseRecord {
                id: 1,
                add_time: Utc::now(),
                edit_time: Utc::now(),
            },
            id: 2,
        };
        assert_eq!(resolve_identity(&shadowed, "id").unwrap(), 2);
        // The embedded timestamp is still reachable when nothing shadows it.
        assert!(shadowed.field("add_time").is_some());
    }

    #[test]
    fn test_identity_resolved_through_reference() {
        let demo = make_demo(64);
        let by_ref: &DemoEntity = &demo;
        assert_eq!(resolve_identity(&by_ref, "id").unwrap(), 64);

        let boxed: Box<DemoEntity> = Box::new(demo);
        assert_eq!(resolve_identity(&boxed, "id").unwrap(), 64);
    }

    #[test]
    fn test_field_value_kinds() {
        assert_eq!(FieldValue::Int(1).kind(), "integer");
        assert_eq!(FieldValue::Text("x".to_string()).kind(), "text");
        assert_eq!(FieldValue::Timestamp(Utc::now()).kind(), "timestamp");
        assert_eq!(FieldValue::Bool(true).kind(), "boolean");
    }

    #[test]
    fn test_field_value_json_matches_derived_serialization() {
        let demo = make_demo(9);
        let doc = serde_json::to_value(&demo).unwrap();

        assert_eq!(doc["name"], FieldValue::from("tdj").to_json());
        assert_eq!(doc["status"], FieldValue::from(1i64).to_json());
        assert_eq!(doc["id"], FieldValue::from(9i64).to_json());
        assert_eq!(
            doc["add_time"],
            FieldValue::from(demo.base.add_time).to_json()
        );
    }

    #[test]
    fn test_field_assignment_new() {
        let assignment = FieldAssignment::new("status", 2i64);
        assert_eq!(assignment.name, "status");
        assert_eq!(assignment.value, FieldValue::Int(2));
    }
}
