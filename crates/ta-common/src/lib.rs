//! Telemetry rollup common types and errors.
//!
//! This crate provides the foundations shared by the schema registry and the
//! merge engine:
//! - Record trees keyed by numeric field ids
//! - Rollup tuples written into aggregated output
//! - The unified error taxonomy with stable codes

pub mod error;
pub mod record;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use record::{FieldId, Number, Record, Rollup, Value};
