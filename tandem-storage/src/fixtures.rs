//! Shared test fixtures: a demo entity with an embedded base record.

use serde::{Deserialize, Serialize};
use tandem_core::{Entity, FieldValue, Record, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRecord {
    pub id: i64,
    pub add_time: Timestamp,
    pub edit_time: Timestamp,
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
pub struct DemoEntity {
    #[serde(flatten)]
    pub base: BaseRecord,
    pub name: String,
    pub status: i64,
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

impl Entity for DemoEntity {
    fn entity_name() -> &'static str {
        "Demo"
    }
}

pub fn make_demo(id: i64, name: &str, status: i64) -> DemoEntity {
    DemoEntity {
        base: BaseRecord {
            id,
            add_time: chrono::Utc::now(),
            edit_time: chrono::Utc::now(),
        },
        name: name.to_string(),
        status,
    }
}
