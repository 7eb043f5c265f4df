//! Invariant violations and per-call merge reporting.
//!
//! A violation never aborts a merge. The output keeps the first observed value
//! and the disagreement is handed to a [`ViolationHandler`] and recorded in
//! the [`MergeReport`].

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use ta_common::{FieldId, Value};
use tracing::warn;

use crate::group_key::GroupKey;

/// Which invariant was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A PrimaryKey field disagrees inside one group.
    PrimaryKeyMismatch,
    /// A copy-if-equal field disagrees inside one group.
    UnmarkedMismatch,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::PrimaryKeyMismatch => write!(f, "primary_key_mismatch"),
            ViolationKind::UnmarkedMismatch => write!(f, "unmarked_mismatch"),
        }
    }
}

/// A field that should agree across a group but does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    pub type_name: String,
    pub field: FieldId,
    pub group_key: GroupKey,
    pub kind: ViolationKind,
    /// The value kept in the output.
    pub first: Value,
    pub conflicting: Value,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}.{} in group {}: {} vs {}",
            self.kind, self.type_name, self.field, self.group_key, self.first, self.conflicting
        )
    }
}

/// Receives violations as they are found.
///
/// Handlers may be called from several rayon workers at once.
pub trait ViolationHandler: Send + Sync {
    fn on_violation(&self, violation: &InvariantViolation);
}

impl<F> ViolationHandler for F
where
    F: Fn(&InvariantViolation) + Send + Sync,
{
    fn on_violation(&self, violation: &InvariantViolation) {
        self(violation)
    }
}

/// Default handler: one `warn!` per violation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogViolations;

impl ViolationHandler for LogViolations {
    fn on_violation(&self, violation: &InvariantViolation) {
        warn!(
            kind = %violation.kind,
            type_name = %violation.type_name,
            field = violation.field,
            group_key = %violation.group_key,
            first = %violation.first,
            conflicting = %violation.conflicting,
            "invariant violation"
        );
    }
}

/// Non-fatal problems that are not invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum MergeIssue {
    /// A rollup field carried a value that is not a number.
    NonNumericRollup {
        type_name: String,
        field: FieldId,
        kind: String,
    },
    /// An `or` field carried values that are neither all bool nor all integer.
    NonBitwiseOr { type_name: String, field: FieldId },
    /// A raw record carried a field at a rollup target id; it was dropped.
    TargetIdInInput { type_name: String, field: FieldId },
    /// A message collection also contained non-message elements; they were dropped.
    MixedCollection { type_name: String, field: FieldId },
}

impl fmt::Display for MergeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeIssue::NonNumericRollup {
                type_name,
                field,
                kind,
            } => write!(f, "{}.{}: {} value ignored by rollup", type_name, field, kind),
            MergeIssue::NonBitwiseOr { type_name, field } => {
                write!(f, "{}.{}: or over non-bitwise values", type_name, field)
            }
            MergeIssue::TargetIdInInput { type_name, field } => {
                write!(f, "{}.{}: raw value at a rollup target id", type_name, field)
            }
            MergeIssue::MixedCollection { type_name, field } => {
                write!(f, "{}.{}: non-message elements in a message collection", type_name, field)
            }
        }
    }
}

/// Everything observed during one merge call besides the output record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    /// Records in the top-level batch.
    pub records_in: usize,
    /// Output nodes produced, including nested ones.
    pub groups_merged: usize,
    /// Groups cut by `limited` truncation.
    pub groups_truncated: usize,
    pub violations: Vec<InvariantViolation>,
    pub issues: Vec<MergeIssue>,
    /// (type, field) pairs not listed in a type that has a schema entry.
    pub unknown_fields: BTreeSet<(String, FieldId)>,
}

impl MergeReport {
    /// True when nothing was flagged.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.issues.is_empty() && self.unknown_fields.is_empty()
    }

    /// Fold a report produced for a sub-tree into this one.
    pub fn absorb(&mut self, other: MergeReport) {
        self.groups_merged += other.groups_merged;
        self.groups_truncated += other.groups_truncated;
        self.violations.extend(other.violations);
        self.issues.extend(other.issues);
        self.unknown_fields.extend(other.unknown_fields);
    }
}
