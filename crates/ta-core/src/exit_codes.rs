//! Exit codes for the `ta-core` CLI.
//!
//! Ranges:
//! - 0-9: outcomes
//! - 10-19: user/input errors
//! - 20-29: internal errors

use ta_common::ErrorCategory;

/// Process exit status. Stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success with nothing to report.
    Clean = 0,
    /// Merge finished, but the report carries violations or issues.
    MergedWithFindings = 1,

    /// Invalid arguments.
    ArgsError = 10,
    /// The schema document failed to load.
    SchemaError = 11,
    /// The batch could not be merged.
    MergeError = 12,
    /// Input could not be parsed.
    InputError = 13,

    InternalError = 20,
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::MergedWithFindings => "OK_FINDINGS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::SchemaError => "ERR_SCHEMA",
            ExitCode::MergeError => "ERR_MERGE",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for a unified error.
    pub fn for_error(err: &ta_common::Error) -> Self {
        match err {
            ta_common::Error::Json(_) => ExitCode::InputError,
            _ => match err.category() {
                ErrorCategory::Schema => ExitCode::SchemaError,
                ErrorCategory::Merge => ExitCode::MergeError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::MergedWithFindings.is_success());
        assert!(ExitCode::SchemaError.is_user_error());
        assert!(!ExitCode::SchemaError.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn test_for_error() {
        assert_eq!(
            ExitCode::for_error(&ta_common::Error::EmptyBatch),
            ExitCode::MergeError
        );
        assert_eq!(
            ExitCode::for_error(&ta_common::Error::SchemaLoad("x".into())),
            ExitCode::SchemaError
        );
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(
            ExitCode::for_error(&ta_common::Error::Json(json_err)),
            ExitCode::InputError
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::SchemaError.to_string(), "ERR_SCHEMA (11)");
    }
}
