//! Error types for telemetry rollup.
//!
//! Every failure the workspace can surface maps onto this enum, which gives:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Crate-local errors (`SchemaLoadError`, `MergeError`) convert into [`Error`]
//! at the CLI boundary.
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 11,
//!   "category": "schema",
//!   "message": "duplicate schema entry for type 'status_code_details'",
//!   "recoverable": false,
//!   "context": { "type_name": "status_code_details" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for telemetry rollup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Schema configuration errors (load-time, fatal).
    Schema,
    /// Merge-call errors (fatal to one call).
    Merge,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Schema => write!(f, "schema"),
            ErrorCategory::Merge => write!(f, "merge"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for telemetry rollup.
#[derive(Error, Debug)]
pub enum Error {
    // Schema errors (10-19)
    #[error("schema load failed: {0}")]
    SchemaLoad(String),

    #[error("duplicate schema entry for type '{type_name}'")]
    DuplicateType { type_name: String },

    #[error("rollup target {target} collides with a source field in type '{type_name}'")]
    TargetCollision { type_name: String, target: u32 },

    #[error("illegal directive combination on {type_name}.{field}: {message}")]
    IllegalCombination {
        type_name: String,
        field: u32,
        message: String,
    },

    // Merge errors (20-29)
    #[error("merge invoked on an empty batch")]
    EmptyBatch,

    #[error("type mismatch in batch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid merge configuration: {0}")]
    MergeConfig(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Schema errors
    /// - 20-29: Merge errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::SchemaLoad(_) => 10,
            Error::DuplicateType { .. } => 11,
            Error::TargetCollision { .. } => 12,
            Error::IllegalCombination { .. } => 13,
            Error::EmptyBatch => 20,
            Error::TypeMismatch { .. } => 21,
            Error::MergeConfig(_) => 22,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::SchemaLoad(_)
            | Error::DuplicateType { .. }
            | Error::TargetCollision { .. }
            | Error::IllegalCombination { .. } => ErrorCategory::Schema,

            Error::EmptyBatch | Error::TypeMismatch { .. } | Error::MergeConfig(_) => {
                ErrorCategory::Merge
            }

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Schema errors are never recoverable at runtime: the process must not
    /// run with an invalid schema. Merge errors only affect the failing call.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::SchemaLoad(_)
            | Error::DuplicateType { .. }
            | Error::TargetCollision { .. }
            | Error::IllegalCombination { .. } => false,

            Error::EmptyBatch => true,
            Error::TypeMismatch { .. } => true,
            Error::MergeConfig(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::SchemaLoad(_) => {
                "Run 'ta-core check --schema <file>' to locate the malformed entry."
            }
            Error::DuplicateType { .. } => {
                "Each type may appear once. Merge the two entries by hand; the loader will not pick one."
            }
            Error::TargetCollision { .. } => {
                "Rollup target ids must not reuse a source field id of the same type."
            }
            Error::IllegalCombination { .. } => {
                "A field cannot be both a primary key and a rollup source. Remove one directive."
            }
            Error::EmptyBatch => "Pass at least one record to merge.",
            Error::TypeMismatch { .. } => {
                "All records in one batch must share a message type. Split the batch by type."
            }
            Error::MergeConfig(_) => "Check the merge configuration file for invalid values.",
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => "Invalid JSON input. Check syntax with 'jq . <file>'.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::SchemaLoad(_) => "Schema Load Failed",
            Error::DuplicateType { .. } => "Duplicate Schema Type",
            Error::TargetCollision { .. } => "Rollup Target Collision",
            Error::IllegalCombination { .. } => "Illegal Directive Combination",
            Error::EmptyBatch => "Empty Batch",
            Error::TypeMismatch { .. } => "Batch Type Mismatch",
            Error::MergeConfig(_) => "Invalid Merge Configuration",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., type name, field id).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::DuplicateType { type_name } => {
                context.insert("type_name".to_string(), serde_json::json!(type_name));
            }
            Error::TargetCollision { type_name, target } => {
                context.insert("type_name".to_string(), serde_json::json!(type_name));
                context.insert("target".to_string(), serde_json::json!(target));
            }
            Error::IllegalCombination {
                type_name, field, ..
            } => {
                context.insert("type_name".to_string(), serde_json::json!(type_name));
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::TypeMismatch { expected, found } => {
                context.insert("expected".to_string(), serde_json::json!(expected));
                context.insert("found".to_string(), serde_json::json!(found));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
