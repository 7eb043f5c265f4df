//! Errors that abort a merge call.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("merge invoked on an empty batch")]
    EmptyBatch,

    /// Instances of different types were asked to merge into one node.
    #[error("type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid merge configuration: {0}")]
    Config(String),
}

impl From<MergeError> for ta_common::Error {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::EmptyBatch => ta_common::Error::EmptyBatch,
            MergeError::TypeMismatch { expected, found } => {
                ta_common::Error::TypeMismatch { expected, found }
            }
            MergeError::Config(msg) => ta_common::Error::MergeConfig(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_codes() {
        let err: ta_common::Error = MergeError::EmptyBatch.into();
        assert_eq!(err.code(), 20);

        let err: ta_common::Error = MergeError::TypeMismatch {
            expected: "host".into(),
            found: "process".into(),
        }
        .into();
        assert_eq!(err.code(), 21);
        assert!(err.to_string().contains("'process'"));

        let err: ta_common::Error = MergeError::Config("bad".into()).into();
        assert_eq!(err.code(), 22);
    }
}
