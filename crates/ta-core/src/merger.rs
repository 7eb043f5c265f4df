//! The recursive tree merger.
//!
//! A batch of same-type records is folded into one aggregated record. Every
//! field is classified against the schema registry and combined by its
//! directive: rollup, OR, limited, unique, primary key, or copy-if-equal.
//! Nested messages are merged recursively; repeated message collections are
//! partitioned by [`GroupKey`] first and each partition is merged on its own.
//!
//! Output is deterministic for a given batch order. Fields are visited in
//! ascending id order, partitions are kept in first-seen order, and limited
//! truncation breaks ties by first appearance.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use ta_common::{FieldId, Record, Value};
use ta_schema::{DirectiveSet, SchemaRegistry, ValueBehavior};
use tracing::{debug, debug_span, trace, warn};

use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::group_key::GroupKey;
use crate::limiter::{CardinalityLimiter, Weighted};
use crate::rollup::RollupAccumulator;
use crate::unique::UniquenessCounter;
use crate::violation::{
    InvariantViolation, LogViolations, MergeIssue, MergeReport, ViolationHandler, ViolationKind,
};

/// Result of one merge call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub record: Record,
    pub report: MergeReport,
}

/// How the present values of one field are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Every instance holds a singular nested message.
    Message,
    /// Every instance holds a list, and at least one holds messages.
    Collection,
    Scalar,
}

impl Shape {
    fn of(values: &[&Value]) -> Self {
        if values.iter().all(|v| matches!(v, Value::Message(_))) {
            Shape::Message
        } else if values.iter().all(|v| matches!(v, Value::List(_)))
            && values.iter().any(|v| v.is_message_list())
        {
            Shape::Collection
        } else {
            Shape::Scalar
        }
    }
}

struct Partition<'r> {
    key: GroupKey,
    members: Vec<&'r Record>,
}

/// Merges batches of raw records into aggregated records.
///
/// Holds only read-only state, so one merger can serve many threads.
pub struct TreeMerger<'a> {
    registry: &'a SchemaRegistry,
    config: MergeConfig,
    limiter: CardinalityLimiter,
    handler: Arc<dyn ViolationHandler>,
}

impl<'a> TreeMerger<'a> {
    /// Create a merger. Violations are logged until a handler is installed.
    pub fn new(registry: &'a SchemaRegistry, config: MergeConfig) -> Result<Self, MergeError> {
        config.validate()?;
        Ok(Self::from_valid(registry, config))
    }

    /// Merger with the default configuration.
    pub fn with_defaults(registry: &'a SchemaRegistry) -> Self {
        Self::from_valid(registry, MergeConfig::default())
    }

    fn from_valid(registry: &'a SchemaRegistry, config: MergeConfig) -> Self {
        Self {
            registry,
            limiter: CardinalityLimiter::new(config.limited_capacity),
            config,
            handler: Arc::new(LogViolations),
        }
    }

    /// Route violations to `handler` instead of the log.
    pub fn with_handler<H: ViolationHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// Merge one batch of records of a single type.
    pub fn merge(&self, batch: &[Record]) -> Result<MergeOutcome, MergeError> {
        let first = batch.first().ok_or(MergeError::EmptyBatch)?;
        let span = debug_span!("merge", type_name = %first.type_name, records = batch.len());
        let _guard = span.enter();

        let nodes: Vec<&Record> = batch.iter().collect();
        let key = GroupKey::of(first, self.registry);
        let mut report = MergeReport {
            records_in: batch.len(),
            ..Default::default()
        };
        let record = self.merge_nodes(&nodes, &key, &mut report)?;

        debug!(
            groups = report.groups_merged,
            truncated = report.groups_truncated,
            violations = report.violations.len(),
            issues = report.issues.len(),
            "merge complete"
        );
        Ok(MergeOutcome { record, report })
    }

    /// Merge independent batches on the rayon pool. Results keep input order.
    pub fn merge_many(&self, batches: &[Vec<Record>]) -> Vec<Result<MergeOutcome, MergeError>> {
        batches.par_iter().map(|batch| self.merge(batch)).collect()
    }

    fn merge_nodes(
        &self,
        nodes: &[&Record],
        key: &GroupKey,
        report: &mut MergeReport,
    ) -> Result<Record, MergeError> {
        let first = *nodes.first().ok_or(MergeError::EmptyBatch)?;
        if let Some(other) = nodes.iter().find(|n| n.type_name != first.type_name) {
            return Err(MergeError::TypeMismatch {
                expected: first.type_name.clone(),
                found: other.type_name.clone(),
            });
        }
        report.groups_merged += 1;

        let type_name = first.type_name.as_str();
        if self.registry.is_skipped(type_name) {
            trace!(type_name, "skipped type, passing first instance through");
            return Ok(first.clone());
        }

        let schema = self.registry.lookup(type_name);
        let classifier = self.registry.classifier();
        let mut field_ids: BTreeSet<FieldId> = nodes.iter().flat_map(|n| n.field_ids()).collect();
        if let Some(schema) = schema {
            field_ids.extend(schema.source_fields());
        }

        let mut out = Record::new(type_name);
        for field in field_ids {
            let present: Vec<&Value> = nodes.iter().filter_map(|n| n.get(field)).collect();

            if schema.is_some_and(|s| s.is_target(field)) {
                if !present.is_empty() {
                    report.issues.push(MergeIssue::TargetIdInInput {
                        type_name: type_name.to_string(),
                        field,
                    });
                }
                continue;
            }
            if present.is_empty() {
                continue;
            }

            if self.config.report_unknown_fields
                && classifier.is_unknown(type_name, field)
                && report.unknown_fields.insert((type_name.to_string(), field))
            {
                warn!(type_name, field, "field not in schema, merging copy-if-equal");
            }
            let set = classifier.classify(type_name, field).directives();
            self.merge_field(&mut out, type_name, field, set, &present, key, report)?;
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_field(
        &self,
        out: &mut Record,
        type_name: &str,
        field: FieldId,
        set: DirectiveSet,
        present: &[&Value],
        key: &GroupKey,
        report: &mut MergeReport,
    ) -> Result<(), MergeError> {
        let shape = Shape::of(present);

        if set.unique {
            let count = self.count_distinct(present, shape);
            out.distinct_counts.insert(field, count);
            if set.is_unique_only() && shape == Shape::Scalar {
                out.set(field, Value::UInt(count));
                return Ok(());
            }
        }

        match set.behavior() {
            ValueBehavior::PrimaryKey => {
                let value = self.copy_if_equal(
                    type_name,
                    field,
                    present,
                    key,
                    ViolationKind::PrimaryKeyMismatch,
                    report,
                );
                out.set(field, value);
            }
            ValueBehavior::Rollup(target) => {
                let mut acc = RollupAccumulator::new();
                let mut flagged = false;
                for leaf in present.iter().copied().flat_map(Value::leaves) {
                    match leaf.as_number() {
                        Some(n) => acc.push(n),
                        None if !flagged => {
                            flagged = true;
                            report.issues.push(MergeIssue::NonNumericRollup {
                                type_name: type_name.to_string(),
                                field,
                                kind: leaf.kind().to_string(),
                            });
                        }
                        None => {}
                    }
                }
                out.set(target, Value::Rollup(acc.finish()));
            }
            ValueBehavior::Or => {
                let value = match bitwise_or(present) {
                    Some(v) => v,
                    None => {
                        report.issues.push(MergeIssue::NonBitwiseOr {
                            type_name: type_name.to_string(),
                            field,
                        });
                        self.copy_if_equal(
                            type_name,
                            field,
                            present,
                            key,
                            ViolationKind::UnmarkedMismatch,
                            report,
                        )
                    }
                };
                out.set(field, value);
            }
            ValueBehavior::Limited if shape == Shape::Collection => {
                let items = self.merge_collection(type_name, field, present, true, report)?;
                out.set(field, Value::List(items));
            }
            ValueBehavior::Limited | ValueBehavior::CopyIfEqual if shape == Shape::Message => {
                let children: Vec<&Record> =
                    present.iter().copied().filter_map(Value::as_message).collect();
                let child_key = GroupKey::of(children[0], self.registry);
                let merged = self.merge_nodes(&children, &child_key, report)?;
                out.set(field, Value::Message(merged));
            }
            ValueBehavior::Limited => {
                let value = match self.copy_if_equal(
                    type_name,
                    field,
                    present,
                    key,
                    ViolationKind::UnmarkedMismatch,
                    report,
                ) {
                    Value::List(items) => {
                        let cut = self.limiter.truncate_list(items);
                        report.groups_truncated += cut.dropped;
                        Value::List(cut.kept)
                    }
                    other => other,
                };
                out.set(field, value);
            }
            ValueBehavior::CopyIfEqual if shape == Shape::Collection => {
                let items = self.merge_collection(type_name, field, present, false, report)?;
                out.set(field, Value::List(items));
            }
            ValueBehavior::CopyIfEqual => {
                let value = self.copy_if_equal(
                    type_name,
                    field,
                    present,
                    key,
                    ViolationKind::UnmarkedMismatch,
                    report,
                );
                out.set(field, value);
            }
        }
        Ok(())
    }

    /// Partition the children of a repeated field by (type, key), merge each
    /// partition, and optionally apply the limited bound.
    fn merge_collection(
        &self,
        type_name: &str,
        field: FieldId,
        present: &[&Value],
        limited: bool,
        report: &mut MergeReport,
    ) -> Result<Vec<Value>, MergeError> {
        let mut partitions: Vec<Partition<'_>> = Vec::new();
        let mut index: HashMap<(&str, GroupKey), usize> = HashMap::new();
        let mut mixed = false;

        for item in present.iter().copied().flat_map(Value::leaves) {
            let Some(child) = item.as_message() else {
                mixed = true;
                continue;
            };
            let key = GroupKey::of(child, self.registry);
            match index.entry((child.type_name.as_str(), key)) {
                Entry::Occupied(slot) => partitions[*slot.get()].members.push(child),
                Entry::Vacant(slot) => {
                    let key = slot.key().1.clone();
                    slot.insert(partitions.len());
                    partitions.push(Partition {
                        key,
                        members: vec![child],
                    });
                }
            }
        }
        if mixed {
            report.issues.push(MergeIssue::MixedCollection {
                type_name: type_name.to_string(),
                field,
            });
        }
        trace!(type_name, field, partitions = partitions.len(), "partitioned collection");

        let merged = if self.config.parallel_partitions
            && partitions.len() >= self.config.parallel_threshold
        {
            let results: Vec<(Result<Record, MergeError>, MergeReport)> = partitions
                .par_iter()
                .map(|p| {
                    let mut sub = MergeReport::default();
                    let record = self.merge_nodes(&p.members, &p.key, &mut sub);
                    (record, sub)
                })
                .collect();
            let mut merged = Vec::with_capacity(results.len());
            for ((record, sub), p) in results.into_iter().zip(&partitions) {
                report.absorb(sub);
                merged.push(Weighted::new(record?, p.members.len() as u64));
            }
            merged
        } else {
            let mut merged = Vec::with_capacity(partitions.len());
            for p in &partitions {
                let record = self.merge_nodes(&p.members, &p.key, report)?;
                merged.push(Weighted::new(record, p.members.len() as u64));
            }
            merged
        };

        let kept = if limited {
            let cut = self.limiter.truncate(merged);
            if cut.dropped > 0 {
                debug!(
                    type_name,
                    field,
                    dropped = cut.dropped,
                    capacity = self.limiter.capacity(),
                    "limited collection truncated"
                );
            }
            report.groups_truncated += cut.dropped;
            cut.kept
        } else {
            merged.into_iter().map(|w| w.item).collect()
        };
        Ok(kept.into_iter().map(Value::Message).collect())
    }

    fn count_distinct(&self, present: &[&Value], shape: Shape) -> u64 {
        match shape {
            Shape::Scalar => {
                let mut counter = UniquenessCounter::new();
                for &value in present {
                    counter.observe_value(value);
                }
                counter.count()
            }
            Shape::Message | Shape::Collection => {
                let mut counter = UniquenessCounter::new();
                for child in present
                    .iter()
                    .copied()
                    .flat_map(Value::leaves)
                    .filter_map(Value::as_message)
                {
                    counter.observe((child.type_name.as_str(), GroupKey::of(child, self.registry)));
                }
                counter.count()
            }
        }
    }

    /// Keep the first value; report every distinct value that differs from it.
    fn copy_if_equal(
        &self,
        type_name: &str,
        field: FieldId,
        present: &[&Value],
        key: &GroupKey,
        kind: ViolationKind,
        report: &mut MergeReport,
    ) -> Value {
        let first = present[0];
        let mut reported: Vec<&Value> = Vec::new();
        for &value in &present[1..] {
            if value == first || reported.contains(&value) {
                continue;
            }
            reported.push(value);
            let violation = InvariantViolation {
                type_name: type_name.to_string(),
                field,
                group_key: key.clone(),
                kind,
                first: first.clone(),
                conflicting: value.clone(),
            };
            self.handler.on_violation(&violation);
            report.violations.push(violation);
        }
        first.clone()
    }
}

/// Logical OR of bools, bitwise OR of same-signedness integers.
fn bitwise_or(values: &[&Value]) -> Option<Value> {
    let (&head, rest) = values.split_first()?;
    if !matches!(head, Value::Bool(_) | Value::UInt(_) | Value::Int(_)) {
        return None;
    }
    rest.iter()
        .copied()
        .try_fold(head.clone(), |acc, value| match (acc, value) {
            (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(a || *b)),
            (Value::UInt(a), Value::UInt(b)) => Some(Value::UInt(a | b)),
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a | b)),
            _ => None,
        })
}
