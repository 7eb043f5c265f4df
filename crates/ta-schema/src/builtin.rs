//! The production aggregation table.
//!
//! Shipped as an embedded document and loaded through the same parser and
//! validator as any external schema file.

use crate::document::DocumentFormat;
use crate::registry::SchemaRegistry;
use crate::validate::SchemaResult;

/// The built-in schema document (JSON).
pub const BUILTIN_SCHEMA: &str = include_str!("builtin_schema.json");

impl SchemaRegistry {
    /// Load the built-in aggregation table and skip set.
    pub fn builtin() -> SchemaResult<Self> {
        Self::parse_str(BUILTIN_SCHEMA, DocumentFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::ValueBehavior;
    use crate::validate::DiagnosticKind;

    #[test]
    fn test_builtin_loads() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(registry.type_names().count(), 81);
        assert_eq!(
            registry.skipped_types().collect::<Vec<_>>(),
            vec![
                "aggregations64",
                "aggregations64_repeated",
                "aggregations_double",
                "matchlist_detail"
            ]
        );
    }

    #[test]
    fn test_builtin_entries() {
        let registry = SchemaRegistry::builtin().unwrap();

        let counter_time = registry.lookup("counter_time").unwrap();
        assert_eq!(
            counter_time.directives(1).unwrap().behavior(),
            ValueBehavior::Rollup(4)
        );

        let process = registry.lookup("process").unwrap();
        assert_eq!(process.directives(13).unwrap().behavior(), ValueBehavior::Or);
        assert_eq!(process.directives(24).unwrap().behavior(), ValueBehavior::Limited);

        let prom_metric = registry.lookup("prom_metric").unwrap();
        assert_eq!(prom_metric.primary_key_fields(), &[1, 4]);
        assert!(prom_metric.directives(4).unwrap().unique);

        let info = registry.lookup("prometheus_info").unwrap().directives(2).unwrap();
        assert!(info.limited && info.unique);

        let status = registry.lookup("status_code_details").unwrap();
        assert_eq!(status.primary_key_fields(), &[1]);
        assert_eq!(status.source_of(3), Some(2));
    }

    #[test]
    fn test_builtin_annotations_reported() {
        let registry = SchemaRegistry::builtin().unwrap();
        let annotated: Vec<_> = registry
            .diagnostics()
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Annotated)
            .map(|d| d.type_name.as_str())
            .collect();
        assert!(annotated.contains(&"jmx_attribute"));
        assert!(annotated.contains(&"k8s_pod"));
        assert!(registry
            .diagnostics()
            .iter()
            .all(|d| d.kind == DiagnosticKind::Annotated));
    }
}
