//! Schema load errors, diagnostics, and semantic validation.
//!
//! Validation turns a [`SchemaDocument`] into per-type directive tables.
//! Anything that would make merge behavior ambiguous aborts the load; known
//! historical oddities are accepted and reported as [`SchemaDiagnostic`]s.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ta_common::FieldId;
use thiserror::Error;

use crate::directive::{Directive, DirectiveSet};
use crate::document::{FieldEntry, RawMarker, SchemaDocument, TypeEntry, SCHEMA_VERSION};

/// Schema load result type.
pub type SchemaResult<T> = Result<T, SchemaLoadError>;

/// Errors that reject a schema at load time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaLoadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("duplicate schema entry for type '{type_name}'")]
    DuplicateType { type_name: String },

    #[error("duplicate field {field} in type '{type_name}'")]
    DuplicateField { type_name: String, field: FieldId },

    #[error("malformed entry {type_name}.{field}: {message}")]
    Malformed {
        type_name: String,
        field: FieldId,
        message: String,
    },

    #[error("rollup target {target} of {type_name}.{field} collides with field {other}")]
    TargetCollision {
        type_name: String,
        field: FieldId,
        target: FieldId,
        other: FieldId,
    },

    #[error("{type_name}.{field}: a primary key cannot also be a rollup source")]
    IllegalCombination { type_name: String, field: FieldId },

    #[error("type '{type_name}' is listed both in types and in skip")]
    SkippedAndAggregated { type_name: String },
}

impl SchemaLoadError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            SchemaLoadError::Io(_) => 60,
            SchemaLoadError::Parse(_) => 10,
            SchemaLoadError::VersionMismatch { .. } => 10,
            SchemaLoadError::DuplicateType { .. } => 11,
            SchemaLoadError::DuplicateField { .. } => 10,
            SchemaLoadError::Malformed { .. } => 10,
            SchemaLoadError::TargetCollision { .. } => 12,
            SchemaLoadError::IllegalCombination { .. } => 13,
            SchemaLoadError::SkippedAndAggregated { .. } => 10,
        }
    }
}

impl From<SchemaLoadError> for ta_common::Error {
    fn from(err: SchemaLoadError) -> Self {
        match err {
            SchemaLoadError::Io(msg) => {
                ta_common::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, msg))
            }
            SchemaLoadError::DuplicateType { type_name } => {
                ta_common::Error::DuplicateType { type_name }
            }
            SchemaLoadError::TargetCollision {
                type_name, target, ..
            } => ta_common::Error::TargetCollision { type_name, target },
            SchemaLoadError::IllegalCombination { type_name, field } => {
                ta_common::Error::IllegalCombination {
                    type_name,
                    field,
                    message: "primary key combined with rollup target".to_string(),
                }
            }
            other => ta_common::Error::SchemaLoad(other.to_string()),
        }
    }
}

/// Kind of a load-time diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// More than one rollup target on a field; the first is effective.
    MultipleRollupTargets,
    /// The same marker listed more than once on a field.
    RepeatedMarker,
    /// A value directive hidden by a higher-precedence one.
    ShadowedDirective,
    /// The type carries an annotation about a known inconsistency.
    Annotated,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::MultipleRollupTargets => write!(f, "multiple_rollup_targets"),
            DiagnosticKind::RepeatedMarker => write!(f, "repeated_marker"),
            DiagnosticKind::ShadowedDirective => write!(f, "shadowed_directive"),
            DiagnosticKind::Annotated => write!(f, "annotated"),
        }
    }
}

/// A tolerated schema irregularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiagnostic {
    pub kind: DiagnosticKind,
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldId>,
    pub message: String,
}

impl std::fmt::Display for SchemaDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field {
            Some(field) => write!(
                f,
                "[{}] {}.{}: {}",
                self.kind, self.type_name, field, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.kind, self.type_name, self.message),
        }
    }
}

/// Output of a successful validation.
#[derive(Debug, Clone, Default)]
pub struct ValidatedSchema {
    pub types: BTreeMap<String, BTreeMap<FieldId, DirectiveSet>>,
    pub skip: BTreeSet<String>,
    pub diagnostics: Vec<SchemaDiagnostic>,
}

/// Validate a document semantically.
///
/// Returns the first error found; types are checked in document order.
pub fn validate_document(doc: &SchemaDocument) -> SchemaResult<ValidatedSchema> {
    if doc.schema_version != SCHEMA_VERSION {
        return Err(SchemaLoadError::VersionMismatch {
            expected: SCHEMA_VERSION.to_string(),
            actual: doc.schema_version.clone(),
        });
    }

    let mut out = ValidatedSchema {
        skip: doc.skip.iter().cloned().collect(),
        ..Default::default()
    };

    for entry in &doc.types {
        if out.types.contains_key(&entry.type_name) {
            return Err(SchemaLoadError::DuplicateType {
                type_name: entry.type_name.clone(),
            });
        }
        if out.skip.contains(&entry.type_name) {
            return Err(SchemaLoadError::SkippedAndAggregated {
                type_name: entry.type_name.clone(),
            });
        }
        let fields = validate_type(entry, &mut out.diagnostics)?;
        out.types.insert(entry.type_name.clone(), fields);
    }

    for (type_name, note) in &doc.annotations {
        let known = out.types.contains_key(type_name) || out.skip.contains(type_name);
        let message = if known {
            note.clone()
        } else {
            format!("annotation for a type with no entry: {}", note)
        };
        out.diagnostics.push(SchemaDiagnostic {
            kind: DiagnosticKind::Annotated,
            type_name: type_name.clone(),
            field: None,
            message,
        });
    }

    Ok(out)
}

/// Validate one type's field entries.
fn validate_type(
    entry: &TypeEntry,
    diagnostics: &mut Vec<SchemaDiagnostic>,
) -> SchemaResult<BTreeMap<FieldId, DirectiveSet>> {
    let type_name = &entry.type_name;
    let mut fields: BTreeMap<FieldId, DirectiveSet> = BTreeMap::new();

    for field_entry in &entry.fields {
        if fields.contains_key(&field_entry.field) {
            return Err(SchemaLoadError::DuplicateField {
                type_name: type_name.clone(),
                field: field_entry.field,
            });
        }
        let set = validate_field(type_name, field_entry, diagnostics)?;
        fields.insert(field_entry.field, set);
    }

    // Targets must not alias a source id, nor each other.
    let mut target_owner: BTreeMap<FieldId, FieldId> = BTreeMap::new();
    for (&field, set) in &fields {
        let Some(target) = set.rollup_target else {
            continue;
        };
        if fields.contains_key(&target) {
            return Err(SchemaLoadError::TargetCollision {
                type_name: type_name.clone(),
                field,
                target,
                other: target,
            });
        }
        if let Some(&other) = target_owner.get(&target) {
            return Err(SchemaLoadError::TargetCollision {
                type_name: type_name.clone(),
                field,
                target,
                other,
            });
        }
        target_owner.insert(target, field);
    }

    Ok(fields)
}

/// Resolve one field's markers into a directive set.
fn validate_field(
    type_name: &str,
    entry: &FieldEntry,
    diagnostics: &mut Vec<SchemaDiagnostic>,
) -> SchemaResult<DirectiveSet> {
    let field = entry.field;
    let malformed = |message: String| SchemaLoadError::Malformed {
        type_name: type_name.to_string(),
        field,
        message,
    };

    if field == 0 {
        return Err(malformed("field id 0 is reserved".to_string()));
    }

    let markers = entry.value.markers();
    if markers.is_empty() {
        return Err(malformed("empty directive set".to_string()));
    }

    let mut set = DirectiveSet::new();
    for marker in markers {
        let directive = match marker {
            RawMarker::Number(n) => Directive::from_legacy(*n)
                .ok_or_else(|| malformed(format!("invalid rollup target {}", n)))?,
            RawMarker::Name(name) => Directive::from_marker(name)
                .ok_or_else(|| malformed(format!("unknown directive marker {:?}", name)))?,
        };

        if set.insert(directive) {
            continue;
        }
        let diagnostic = match directive {
            Directive::RollupTarget(t) if set.rollup_target != Some(t) => SchemaDiagnostic {
                kind: DiagnosticKind::MultipleRollupTargets,
                type_name: type_name.to_string(),
                field: Some(field),
                message: format!(
                    "rollup target {} ignored; {} is effective",
                    t,
                    set.rollup_target.unwrap_or_default()
                ),
            },
            _ => SchemaDiagnostic {
                kind: DiagnosticKind::RepeatedMarker,
                type_name: type_name.to_string(),
                field: Some(field),
                message: format!("directive {} listed more than once", directive),
            },
        };
        diagnostics.push(diagnostic);
    }

    if set.primary_key && set.rollup_target.is_some() {
        return Err(SchemaLoadError::IllegalCombination {
            type_name: type_name.to_string(),
            field,
        });
    }

    if set.value_directive_count() > 1 {
        diagnostics.push(SchemaDiagnostic {
            kind: DiagnosticKind::ShadowedDirective,
            type_name: type_name.to_string(),
            field: Some(field),
            message: format!("{} resolves to {:?}", set, set.behavior()),
        });
    }

    Ok(set)
}
