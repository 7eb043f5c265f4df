//! Field classification for merge decisions.

use ta_common::FieldId;

use crate::directive::DirectiveSet;
use crate::registry::SchemaRegistry;

/// Classification of one (type, field) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClass {
    /// The whole type is in the skip set.
    Skipped,
    /// No directive applies: copy-if-equal.
    Unmarked,
    /// One or more directives apply.
    Directed(DirectiveSet),
}

impl FieldClass {
    /// The directive set, empty for unmarked and skipped fields.
    pub fn directives(&self) -> DirectiveSet {
        match self {
            FieldClass::Directed(set) => *set,
            FieldClass::Skipped | FieldClass::Unmarked => DirectiveSet::default(),
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.directives().primary_key
    }
}

impl std::fmt::Display for FieldClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldClass::Skipped => write!(f, "skipped"),
            FieldClass::Unmarked => write!(f, "unmarked"),
            FieldClass::Directed(set) => write!(f, "{}", set),
        }
    }
}

/// Pure lookup over a [`SchemaRegistry`]; holds no state of its own.
#[derive(Debug, Clone, Copy)]
pub struct FieldClassifier<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> FieldClassifier<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Classify a field of a type.
    pub fn classify(&self, type_name: &str, field: FieldId) -> FieldClass {
        if self.registry.is_skipped(type_name) {
            return FieldClass::Skipped;
        }
        match self
            .registry
            .lookup(type_name)
            .and_then(|schema| schema.directives(field))
        {
            Some(set) if !set.is_unmarked() => FieldClass::Directed(set),
            _ => FieldClass::Unmarked,
        }
    }

    /// True if the type has a directive table and does not list `field`.
    pub fn is_unknown(&self, type_name: &str, field: FieldId) -> bool {
        self.registry
            .lookup(type_name)
            .is_some_and(|schema| schema.directives(field).is_none() && !schema.is_target(field))
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::ValueBehavior;
    use crate::document::DocumentFormat;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::parse_str(
            r#"{
                "types": {
                    "prom_metric": {"1": "primary_key", "3": 103, "4": ["primary_key", "unique"]},
                    "process": {"13": "or"}
                },
                "skip": ["aggregations64"]
            }"#,
            DocumentFormat::Json,
        )
        .unwrap()
    }

    #[test]
    fn test_classify_directed() {
        let registry = registry();
        let classifier = registry.classifier();

        match classifier.classify("prom_metric", 3) {
            FieldClass::Directed(set) => assert_eq!(set.behavior(), ValueBehavior::Rollup(103)),
            other => panic!("unexpected class {:?}", other),
        }

        let combo = classifier.classify("prom_metric", 4);
        assert!(combo.is_primary_key());
        assert!(combo.directives().unique);
        assert_eq!(combo.to_string(), "primary_key+unique");

        assert_eq!(
            classifier.classify("process", 13).directives().behavior(),
            ValueBehavior::Or
        );
    }

    #[test]
    fn test_classify_unmarked_and_skipped() {
        let registry = registry();
        let classifier = registry.classifier();

        assert_eq!(classifier.classify("prom_metric", 2), FieldClass::Unmarked);
        assert_eq!(classifier.classify("host", 2), FieldClass::Unmarked);
        assert_eq!(classifier.classify("aggregations64", 1), FieldClass::Skipped);
    }

    #[test]
    fn test_unknown_fields() {
        let registry = registry();
        let classifier = registry.classifier();

        assert!(classifier.is_unknown("prom_metric", 2));
        assert!(!classifier.is_unknown("prom_metric", 1));
        assert!(!classifier.is_unknown("prom_metric", 103));
        // Types without a table have no notion of unknown fields.
        assert!(!classifier.is_unknown("host", 2));
    }

    #[test]
    fn test_classifier_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FieldClassifier<'static>>();
    }
}
