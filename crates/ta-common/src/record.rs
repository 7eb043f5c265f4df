//! Record trees as seen by the aggregation engine.
//!
//! A [`Record`] is one instance of a message type: a type name plus fields
//! keyed by numeric [`FieldId`]. Raw records come from the collector once per
//! sampling tick; aggregated records share the same shape, with rollup tuples
//! written at their target ids and distinct counts kept alongside.
//!
//! Fields live in a `BTreeMap`, so every walk over a record visits field ids
//! in ascending order. Merge output ordering depends on this.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Numeric identifier of a field within a message type.
pub type FieldId = u32;

/// A numeric scalar as it appears in rollup tuples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Number {
    #[serde(rename = "uint")]
    UInt(u64),
    Int(i64),
    Double(f64),
}

impl Number {
    /// Widen to `f64` for display and cross-kind comparison.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::UInt(v) => v as f64,
            Number::Int(v) => v as f64,
            Number::Double(v) => v,
        }
    }

    /// Short name of the numeric kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Number::UInt(_) => "uint",
            Number::Int(_) => "int",
            Number::Double(_) => "double",
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::UInt(a), Number::UInt(b)) => a == b,
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Double(a), Number::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match *self {
            Number::UInt(v) => v.hash(state),
            Number::Int(v) => v.hash(state),
            Number::Double(v) => v.to_bits().hash(state),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::UInt(v) => write!(f, "{}", v),
            Number::Int(v) => write!(f, "{}", v),
            Number::Double(v) => write!(f, "{}", v),
        }
    }
}

/// Numeric summary written at a rollup target id.
///
/// `min`, `max` and `sum` are `None` exactly when `weight == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rollup {
    /// Number of raw values that contributed.
    pub weight: u64,
    pub min: Option<Number>,
    pub max: Option<Number>,
    pub sum: Option<Number>,
}

impl Rollup {
    /// A rollup over no values.
    pub fn empty() -> Self {
        Self {
            weight: 0,
            min: None,
            max: None,
            sum: None,
        }
    }
}

/// A field value.
///
/// Doubles compare and hash by bit pattern so that `Value` can serve as a
/// grouping key and a distinct-count element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    #[serde(rename = "uint")]
    UInt(u64),
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// A singular nested sub-record.
    Message(Record),
    /// A repeated field: scalars or nested sub-records.
    List(Vec<Value>),
    /// Aggregated output only.
    Rollup(Rollup),
}

impl Value {
    /// Short name of the value kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::UInt(_) => "uint",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Rollup(_) => "rollup",
        }
    }

    /// The numeric content of a scalar, if any. Booleans are not numbers.
    pub fn as_number(&self) -> Option<Number> {
        match *self {
            Value::UInt(v) => Some(Number::UInt(v)),
            Value::Int(v) => Some(Number::Int(v)),
            Value::Double(v) => Some(Number::Double(v)),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Record> {
        match self {
            Value::Message(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_rollup(&self) -> Option<&Rollup> {
        match self {
            Value::Rollup(r) => Some(r),
            _ => None,
        }
    }

    /// True for a non-empty list whose elements are all messages.
    pub fn is_message_list(&self) -> bool {
        match self {
            Value::List(items) => {
                !items.is_empty() && items.iter().all(|v| matches!(v, Value::Message(_)))
            }
            _ => false,
        }
    }

    /// Iterate the scalar leaves of this value: a list yields its elements,
    /// anything else yields itself.
    pub fn leaves(&self) -> impl Iterator<Item = &Value> {
        let slice: &[Value] = match self {
            Value::List(items) => items,
            other => std::slice::from_ref(other),
        };
        slice.iter()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Rollup(a), Value::Rollup(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::UInt(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Message(v) => v.hash(state),
            Value::List(v) => v.hash(state),
            Value::Rollup(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Message(r) => write!(f, "{}{{{} fields}}", r.type_name, r.fields.len()),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Rollup(r) => write!(f, "rollup(weight={})", r.weight),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Message(v)
    }
}

impl From<Vec<Record>> for Value {
    fn from(v: Vec<Record>) -> Self {
        Value::List(v.into_iter().map(Value::Message).collect())
    }
}

/// One node of a record tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Message type this node is an instance of.
    pub type_name: String,

    /// Field values keyed by field id.
    #[serde(default)]
    pub fields: BTreeMap<FieldId, Value>,

    /// Distinct-value counts for Unique fields. Empty on raw records.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub distinct_counts: BTreeMap<FieldId, u64>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
            distinct_counts: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: FieldId, value: impl Into<Value>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn get(&self, field: FieldId) -> Option<&Value> {
        self.fields.get(&field)
    }

    pub fn set(&mut self, field: FieldId, value: impl Into<Value>) {
        self.fields.insert(field, value.into());
    }

    pub fn remove(&mut self, field: FieldId) -> Option<Value> {
        self.fields.remove(&field)
    }

    /// Field ids present on this record, ascending.
    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.keys().copied()
    }

    /// Rollup tuple stored at `field`, if any.
    pub fn rollup(&self, field: FieldId) -> Option<&Rollup> {
        self.get(field).and_then(Value::as_rollup)
    }

    /// Nested records of a repeated field, skipping non-message elements.
    pub fn children(&self, field: FieldId) -> Vec<&Record> {
        match self.get(field) {
            Some(Value::List(items)) => items.iter().filter_map(Value::as_message).collect(),
            Some(Value::Message(r)) => vec![r],
            _ => Vec::new(),
        }
    }

    /// Distinct count recorded for a Unique field.
    pub fn distinct_count(&self, field: FieldId) -> Option<u64> {
        self.distinct_counts.get(&field).copied()
    }
}
