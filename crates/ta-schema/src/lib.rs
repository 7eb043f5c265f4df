//! Aggregation schema registry for telemetry rollup.
//!
//! This crate provides:
//! - The directive model (rollup target, primary key, OR, limited, unique)
//! - Schema documents in JSON, TOML or YAML, including the legacy numeric
//!   sentinel encoding
//! - Load-time validation that rejects duplicate types, aliased rollup
//!   targets and illegal directive combinations
//! - The built-in production table and skip set
//! - A field classifier the merge engine consults at every field
//!
//! # Example
//!
//! ```no_run
//! use ta_schema::{FieldClass, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builtin().unwrap();
//! let classifier = registry.classifier();
//! assert!(matches!(classifier.classify("counter_time", 1), FieldClass::Directed(_)));
//! ```

pub mod builtin;
pub mod directive;
pub mod document;
pub mod field_class;
pub mod registry;
pub mod validate;

pub use builtin::BUILTIN_SCHEMA;
pub use directive::{Directive, DirectiveSet, ValueBehavior};
pub use document::{DocumentFormat, SchemaDocument, SCHEMA_VERSION};
pub use field_class::{FieldClass, FieldClassifier};
pub use registry::{SchemaRegistry, TypeSchema};
pub use validate::{DiagnosticKind, SchemaDiagnostic, SchemaLoadError, SchemaResult};
