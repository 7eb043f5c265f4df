//! The schema registry.
//!
//! Built once before any merge begins and never mutated afterwards, so it can
//! be shared across worker threads by reference without synchronization.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ta_common::FieldId;
use tracing::{debug, info, warn};

use crate::directive::DirectiveSet;
use crate::document::{DocumentFormat, SchemaDocument};
use crate::field_class::FieldClassifier;
use crate::validate::{validate_document, SchemaDiagnostic, SchemaResult};

/// Directives for one message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    name: String,
    fields: BTreeMap<FieldId, DirectiveSet>,
    primary_keys: Vec<FieldId>,
    /// target id -> source id
    targets: BTreeMap<FieldId, FieldId>,
}

impl TypeSchema {
    fn new(name: String, fields: BTreeMap<FieldId, DirectiveSet>) -> Self {
        let primary_keys = fields
            .iter()
            .filter(|(_, set)| set.primary_key)
            .map(|(&id, _)| id)
            .collect();
        let targets = fields
            .iter()
            .filter_map(|(&id, set)| set.rollup_target.map(|t| (t, id)))
            .collect();
        Self {
            name,
            fields,
            primary_keys,
            targets,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directives of a source field, if the schema lists it.
    pub fn directives(&self, field: FieldId) -> Option<DirectiveSet> {
        self.fields.get(&field).copied()
    }

    /// All listed source fields and their directives, ascending by id.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, DirectiveSet)> + '_ {
        self.fields.iter().map(|(&id, &set)| (id, set))
    }

    /// Source field ids listed for this type, ascending.
    pub fn source_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.keys().copied()
    }

    /// PrimaryKey field ids, ascending. Defines GroupKey component order.
    pub fn primary_key_fields(&self) -> &[FieldId] {
        &self.primary_keys
    }

    /// Rollup target ids, ascending.
    pub fn target_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.targets.keys().copied()
    }

    /// True if `field` is written only in aggregated output.
    pub fn is_target(&self, field: FieldId) -> bool {
        self.targets.contains_key(&field)
    }

    /// Source field that rolls up into `target`.
    pub fn source_of(&self, target: FieldId) -> Option<FieldId> {
        self.targets.get(&target).copied()
    }
}

/// Read-only mapping from message type to aggregation directives.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    version: String,
    types: BTreeMap<String, TypeSchema>,
    skip: BTreeSet<String>,
    diagnostics: Vec<SchemaDiagnostic>,
}

impl SchemaRegistry {
    /// Validate a document and build the registry from it.
    pub fn from_document(doc: &SchemaDocument) -> SchemaResult<Self> {
        let validated = validate_document(doc)?;

        let types: BTreeMap<String, TypeSchema> = validated
            .types
            .into_iter()
            .map(|(name, fields)| (name.clone(), TypeSchema::new(name, fields)))
            .collect();

        for diagnostic in &validated.diagnostics {
            warn!(
                kind = %diagnostic.kind,
                type_name = %diagnostic.type_name,
                field = ?diagnostic.field,
                "schema diagnostic: {}",
                diagnostic.message
            );
        }

        info!(
            version = %doc.schema_version,
            types = types.len(),
            skipped = validated.skip.len(),
            diagnostics = validated.diagnostics.len(),
            "schema registry loaded"
        );

        Ok(Self {
            version: doc.schema_version.clone(),
            types,
            skip: validated.skip,
            diagnostics: validated.diagnostics,
        })
    }

    /// Load a schema file. The format follows the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> SchemaResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading schema");
        let doc = SchemaDocument::from_file(path)?;
        Self::from_document(&doc)
    }

    /// Parse and load a schema from text.
    pub fn parse_str(content: &str, format: DocumentFormat) -> SchemaResult<Self> {
        let doc = SchemaDocument::parse(content, format)?;
        Self::from_document(&doc)
    }

    /// Directive table for a type.
    pub fn lookup(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }

    /// True if the type is excluded from aggregation.
    pub fn is_skipped(&self, type_name: &str) -> bool {
        self.skip.contains(type_name)
    }

    /// Field classifier backed by this registry.
    pub fn classifier(&self) -> FieldClassifier<'_> {
        FieldClassifier::new(self)
    }

    /// Diagnostics emitted while loading.
    pub fn diagnostics(&self) -> &[SchemaDiagnostic] {
        &self.diagnostics
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Type names with a directive table, ascending.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Skipped type names, ascending.
    pub fn skipped_types(&self) -> impl Iterator<Item = &str> {
        self.skip.iter().map(String::as_str)
    }
}
