//! Aggregation directives.
//!
//! A field of a message type carries zero or more directives. The set decides
//! how the merge engine combines that field across a batch.

use serde::{Deserialize, Serialize};
use ta_common::FieldId;

/// Legacy sentinel for [`Directive::PrimaryKey`] in numeric configuration files.
pub const LEGACY_PRIMARY_KEY: u64 = 99_999_999;
/// Legacy sentinel for [`Directive::Or`].
pub const LEGACY_OR: u64 = 99_999_998;
/// Legacy sentinel for [`Directive::Limited`].
pub const LEGACY_LIMITED: u64 = 99_999_997;
/// Legacy sentinel for [`Directive::Unique`].
pub const LEGACY_UNIQUE: u64 = 99_999_996;

/// A single aggregation directive attached to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    /// Numeric rollup written at the given target field id.
    RollupTarget(FieldId),
    /// Part of the type's grouping identity.
    PrimaryKey,
    /// Logical/bitwise OR across instances.
    Or,
    /// Repeated collection capped to a fixed size.
    Limited,
    /// Count of distinct raw values.
    Unique,
}

impl Directive {
    /// Parse a marker name as used in configuration documents.
    pub fn from_marker(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "primary_key" | "pk" => Some(Directive::PrimaryKey),
            "or" => Some(Directive::Or),
            "limited" => Some(Directive::Limited),
            "unique" => Some(Directive::Unique),
            _ => None,
        }
    }

    /// Decode a legacy numeric value: a sentinel marker or a rollup target id.
    ///
    /// Returns `None` for `0` and for ids that do not fit a [`FieldId`].
    pub fn from_legacy(value: u64) -> Option<Self> {
        match value {
            LEGACY_PRIMARY_KEY => Some(Directive::PrimaryKey),
            LEGACY_OR => Some(Directive::Or),
            LEGACY_LIMITED => Some(Directive::Limited),
            LEGACY_UNIQUE => Some(Directive::Unique),
            0 => None,
            v => FieldId::try_from(v).ok().map(Directive::RollupTarget),
        }
    }

    /// The numeric encoding used by legacy configuration files.
    pub fn legacy_code(&self) -> u64 {
        match self {
            Directive::RollupTarget(t) => u64::from(*t),
            Directive::PrimaryKey => LEGACY_PRIMARY_KEY,
            Directive::Or => LEGACY_OR,
            Directive::Limited => LEGACY_LIMITED,
            Directive::Unique => LEGACY_UNIQUE,
        }
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Directive::RollupTarget(t) => write!(f, "rollup->{}", t),
            Directive::PrimaryKey => write!(f, "primary_key"),
            Directive::Or => write!(f, "or"),
            Directive::Limited => write!(f, "limited"),
            Directive::Unique => write!(f, "unique"),
        }
    }
}

/// How a field's output value is produced.
///
/// `Unique` is not listed: it composes with every behavior and is tracked
/// separately on [`DirectiveSet::unique`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueBehavior {
    PrimaryKey,
    Rollup(FieldId),
    Or,
    Limited,
    CopyIfEqual,
}

/// The directives attached to one (type, field) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DirectiveSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup_target: Option<FieldId>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub or: bool,
    #[serde(default)]
    pub limited: bool,
    #[serde(default)]
    pub unique: bool,
}

impl DirectiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from directives. The first rollup target wins.
    pub fn from_directives(directives: impl IntoIterator<Item = Directive>) -> Self {
        let mut set = Self::new();
        for d in directives {
            set.insert(d);
        }
        set
    }

    /// Add a directive. Returns `false` when it was already present or, for
    /// a rollup target, when a target was already set.
    pub fn insert(&mut self, directive: Directive) -> bool {
        let slot = match directive {
            Directive::RollupTarget(t) => {
                if self.rollup_target.is_some() {
                    return false;
                }
                self.rollup_target = Some(t);
                return true;
            }
            Directive::PrimaryKey => &mut self.primary_key,
            Directive::Or => &mut self.or,
            Directive::Limited => &mut self.limited,
            Directive::Unique => &mut self.unique,
        };
        let added = !*slot;
        *slot = true;
        added
    }

    pub fn contains(&self, directive: Directive) -> bool {
        match directive {
            Directive::RollupTarget(t) => self.rollup_target == Some(t),
            Directive::PrimaryKey => self.primary_key,
            Directive::Or => self.or,
            Directive::Limited => self.limited,
            Directive::Unique => self.unique,
        }
    }

    /// True when no directive is attached.
    pub fn is_unmarked(&self) -> bool {
        *self == Self::default()
    }

    /// The effective value behavior, by precedence
    /// `PrimaryKey > Rollup > Or > Limited > CopyIfEqual`.
    pub fn behavior(&self) -> ValueBehavior {
        if self.primary_key {
            ValueBehavior::PrimaryKey
        } else if let Some(t) = self.rollup_target {
            ValueBehavior::Rollup(t)
        } else if self.or {
            ValueBehavior::Or
        } else if self.limited {
            ValueBehavior::Limited
        } else {
            ValueBehavior::CopyIfEqual
        }
    }

    /// Number of value-producing directives present (everything but Unique).
    pub fn value_directive_count(&self) -> usize {
        [
            self.primary_key,
            self.rollup_target.is_some(),
            self.or,
            self.limited,
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// Unique with no other value directive: the output value is the count.
    pub fn is_unique_only(&self) -> bool {
        self.unique && self.value_directive_count() == 0
    }

    /// Directives in canonical order.
    pub fn directives(&self) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.primary_key {
            out.push(Directive::PrimaryKey);
        }
        if let Some(t) = self.rollup_target {
            out.push(Directive::RollupTarget(t));
        }
        if self.or {
            out.push(Directive::Or);
        }
        if self.limited {
            out.push(Directive::Limited);
        }
        if self.unique {
            out.push(Directive::Unique);
        }
        out
    }
}

impl std::fmt::Display for DirectiveSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = self.directives();
        if parts.is_empty() {
            return write!(f, "unmarked");
        }
        let names: Vec<String> = parts.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", names.join("+"))
    }
}
