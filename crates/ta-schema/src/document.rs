//! Schema configuration documents.
//!
//! The on-disk form of the aggregation table. A document maps type names to
//! per-field directive values, lists wholly skipped types, and may annotate
//! types with notes about tolerated historical inconsistencies.
//!
//! Type and field maps are read into ordered vectors rather than maps: a
//! type listed twice must reach the validator intact so it can be rejected,
//! where collecting into a map would silently keep the last entry.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use ta_common::FieldId;

use crate::validate::SchemaLoadError;

/// Schema version for the document format.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// A parsed, not yet validated, schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Schema version.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Per-type field directives, in document order, duplicates preserved.
    #[serde(
        default,
        deserialize_with = "deserialize_types",
        serialize_with = "serialize_types"
    )]
    pub types: Vec<TypeEntry>,

    /// Types excluded wholesale from aggregation.
    #[serde(default)]
    pub skip: Vec<String>,

    /// Notes on types with known historical inconsistencies.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            types: Vec::new(),
            skip: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

/// One type's entry in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub type_name: String,
    pub fields: Vec<FieldEntry>,
}

/// One field's directive value as written in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub field: FieldId,
    pub value: RawDirective,
}

/// A directive value: a single marker or a set of markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDirective {
    Single(RawMarker),
    Set(Vec<RawMarker>),
}

impl RawDirective {
    /// The markers in document order.
    pub fn markers(&self) -> &[RawMarker] {
        match self {
            RawDirective::Single(m) => std::slice::from_ref(m),
            RawDirective::Set(ms) => ms,
        }
    }
}

/// A marker: an integer (rollup target id or legacy sentinel) or a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMarker {
    Number(u64),
    Name(String),
}

impl fmt::Display for RawMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawMarker::Number(n) => write!(f, "{}", n),
            RawMarker::Name(s) => write!(f, "{:?}", s),
        }
    }
}

/// Serialization format of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Toml,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => DocumentFormat::Toml,
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(DocumentFormat::Json),
            "toml" => Ok(DocumentFormat::Toml),
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            _ => Err(format!("unknown schema format: {}", s)),
        }
    }
}

impl SchemaDocument {
    /// Read and parse a document from a file; the format follows the extension.
    pub fn from_file(path: &Path) -> Result<Self, SchemaLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchemaLoadError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, DocumentFormat::from_path(path))
    }

    /// Parse a document from text.
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self, SchemaLoadError> {
        match format {
            DocumentFormat::Json => serde_json::from_str(content)
                .map_err(|e| SchemaLoadError::Parse(format!("Invalid JSON: {}", e))),
            DocumentFormat::Toml => toml::from_str(content)
                .map_err(|e| SchemaLoadError::Parse(format!("Invalid TOML: {}", e))),
            DocumentFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| SchemaLoadError::Parse(format!("Invalid YAML: {}", e))),
        }
    }

    /// Render the document as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, SchemaLoadError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SchemaLoadError::Parse(format!("Failed to serialize: {}", e)))
    }
}

/// Field id map key. JSON and TOML keys arrive as strings, YAML keys may be
/// plain integers.
struct FieldKey(FieldId);

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldKeyVisitor;

        impl<'de> Visitor<'de> for FieldKeyVisitor {
            type Value = FieldKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer field id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldKey, E> {
                FieldId::try_from(v)
                    .map(FieldKey)
                    .map_err(|_| E::custom(format!("field id {} out of range", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldKey, E> {
                u64::try_from(v)
                    .map_err(|_| E::custom(format!("field id {} is negative", v)))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldKey, E> {
                let parsed: u64 = v
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("field id {:?} is not an integer", v)))?;
                self.visit_u64(parsed)
            }
        }

        deserializer.deserialize_any(FieldKeyVisitor)
    }
}

/// Field entries of one type, duplicates preserved.
struct FieldEntries(Vec<FieldEntry>);

impl<'de> Deserialize<'de> for FieldEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = FieldEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from field id to directive")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldEntries, A::Error> {
                let mut fields = Vec::new();
                while let Some((key, value)) = map.next_entry::<FieldKey, RawDirective>()? {
                    fields.push(FieldEntry {
                        field: key.0,
                        value,
                    });
                }
                Ok(FieldEntries(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

fn deserialize_types<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<TypeEntry>, D::Error> {
    struct TypesVisitor;

    impl<'de> Visitor<'de> for TypesVisitor {
        type Value = Vec<TypeEntry>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map from type name to field directives")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Vec<TypeEntry>, A::Error> {
            let mut types = Vec::new();
            while let Some((type_name, fields)) = map.next_entry::<String, FieldEntries>()? {
                types.push(TypeEntry {
                    type_name,
                    fields: fields.0,
                });
            }
            Ok(types)
        }
    }

    deserializer.deserialize_map(TypesVisitor)
}

struct FieldsRef<'a>(&'a [FieldEntry]);

impl Serialize for FieldsRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(&entry.field.to_string(), &entry.value)?;
        }
        map.end()
    }
}

fn serialize_types<S: Serializer>(types: &[TypeEntry], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(types.len()))?;
    for entry in types {
        map.serialize_entry(&entry.type_name, &FieldsRef(&entry.fields))?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_markers() {
        let doc = SchemaDocument::parse(
            r#"{
                "types": {
                    "prom_metric": {"1": "primary_key", "3": 103, "4": ["primary_key", "unique"]}
                },
                "skip": ["aggregations64"]
            }"#,
            DocumentFormat::Json,
        )
        .unwrap();

        assert_eq!(doc.schema_version, SCHEMA_VERSION);
        assert_eq!(doc.types.len(), 1);
        let fields = &doc.types[0].fields;
        assert_eq!(fields[0].field, 1);
        assert_eq!(
            fields[0].value,
            RawDirective::Single(RawMarker::Name("primary_key".into()))
        );
        assert_eq!(fields[1].value, RawDirective::Single(RawMarker::Number(103)));
        assert_eq!(fields[2].value.markers().len(), 2);
        assert_eq!(doc.skip, vec!["aggregations64".to_string()]);
    }

    #[test]
    fn test_duplicate_type_preserved() {
        let doc = SchemaDocument::parse(
            r#"{"types": {"status_code_details": {"2": 3}, "status_code_details": {"1": 99999999, "2": 3}}}"#,
            DocumentFormat::Json,
        )
        .unwrap();

        assert_eq!(doc.types.len(), 2);
        assert_eq!(doc.types[0].type_name, doc.types[1].type_name);
    }

    #[test]
    fn test_parse_toml() {
        let doc = SchemaDocument::parse(
            r#"
schema_version = "1.0.0"
skip = ["matchlist_detail"]

[types.counter_time]
"1" = 4
"2" = 5

[types.app_metric]
"1" = "primary_key"
"4" = ["primary_key"]
"#,
            DocumentFormat::Toml,
        )
        .unwrap();

        assert_eq!(doc.types.len(), 2);
        assert_eq!(doc.types[0].type_name, "counter_time");
        assert_eq!(doc.types[0].fields[1].field, 2);
    }

    #[test]
    fn test_parse_yaml_integer_keys() {
        let doc = SchemaDocument::parse(
            "types:\n  counter_time:\n    1: 4\n    2: 5\n    3: 6\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        assert_eq!(doc.types[0].fields.len(), 3);
        assert_eq!(doc.types[0].fields[2].field, 3);
    }

    #[test]
    fn test_rejects_non_integer_field_key() {
        let err = SchemaDocument::parse(r#"{"types": {"t": {"abc": 4}}}"#, DocumentFormat::Json)
            .unwrap_err();
        assert!(matches!(err, SchemaLoadError::Parse(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.toml")), DocumentFormat::Toml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.YML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a")), DocumentFormat::Json);
    }

    #[test]
    fn test_json_roundtrip_keeps_entries() {
        let doc = SchemaDocument::parse(
            r#"{"types": {"counter_time": {"1": 4}}, "annotations": {"counter_time": "note"}}"#,
            DocumentFormat::Json,
        )
        .unwrap();
        let json = doc.to_json_pretty().unwrap();
        let back = SchemaDocument::parse(&json, DocumentFormat::Json).unwrap();
        assert_eq!(back.types, doc.types);
        assert_eq!(back.annotations, doc.annotations);
    }
}
