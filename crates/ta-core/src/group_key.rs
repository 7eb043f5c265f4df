//! Grouping identity of a record.

use std::fmt;

use serde::Serialize;
use ta_common::{FieldId, Record, Value};
use ta_schema::SchemaRegistry;

/// One component of a [`GroupKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeyPart {
    pub field: FieldId,
    /// `None` when the record does not carry the key field.
    pub value: Option<Value>,
}

/// The equivalence class used to partition repeated children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// PrimaryKey values in ascending field id order.
    Fields(Vec<KeyPart>),
    /// The entire record, for types without a PrimaryKey and skipped types.
    Content(Box<Record>),
}

impl GroupKey {
    /// Compute the key of `record` under `registry`.
    pub fn of(record: &Record, registry: &SchemaRegistry) -> Self {
        if registry.is_skipped(&record.type_name) {
            return GroupKey::Content(Box::new(record.clone()));
        }
        match registry.lookup(&record.type_name) {
            Some(schema) if !schema.primary_key_fields().is_empty() => GroupKey::Fields(
                schema
                    .primary_key_fields()
                    .iter()
                    .map(|&field| KeyPart {
                        field,
                        value: record.get(field).cloned(),
                    })
                    .collect(),
            ),
            _ => GroupKey::Content(Box::new(record.clone())),
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, GroupKey::Content(_))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Fields(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &part.value {
                        Some(v) => write!(f, "{}={}", part.field, v)?,
                        None => write!(f, "{}=<absent>", part.field)?,
                    }
                }
                write!(f, ")")
            }
            GroupKey::Content(record) => write!(f, "<content of {}>", record.type_name),
        }
    }
}
