//! Telemetry rollup merge engine.
//!
//! Collapses a batch of same-type raw record trees, one per sampling tick,
//! into a single aggregated record per window. The schema registry from
//! `ta-schema` decides per field whether to roll up, OR, cap, count, group or
//! copy.
//!
//! ```no_run
//! use ta_common::Record;
//! use ta_core::{MergeConfig, TreeMerger};
//! use ta_schema::SchemaRegistry;
//!
//! let registry = SchemaRegistry::builtin().unwrap();
//! let merger = TreeMerger::new(&registry, MergeConfig::default()).unwrap();
//! let batch = vec![
//!     Record::new("counter_time").with(1, 10u64),
//!     Record::new("counter_time").with(1, 20u64),
//! ];
//! let outcome = merger.merge(&batch).unwrap();
//! assert_eq!(outcome.record.rollup(4).map(|r| r.weight), Some(2));
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod group_key;
pub mod limiter;
pub mod logging;
pub mod merger;
pub mod rollup;
pub mod unique;
pub mod violation;

pub use config::{MergeConfig, SchemaSource, SCHEMA_ENV_VAR};
pub use error::MergeError;
pub use exit_codes::ExitCode;
pub use group_key::{GroupKey, KeyPart};
pub use limiter::{CardinalityLimiter, Truncated, Weighted, DEFAULT_LIMITED_CAPACITY};
pub use merger::{MergeOutcome, TreeMerger};
pub use rollup::RollupAccumulator;
pub use unique::UniquenessCounter;
pub use violation::{
    InvariantViolation, LogViolations, MergeIssue, MergeReport, ViolationHandler, ViolationKind,
};
