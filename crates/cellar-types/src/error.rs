use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("missing field `{key}` in {typename}")]
    MissingField { typename: String, key: String },

    #[error("field `{key}` could not be decoded: {reason}")]
    FieldDecode { key: String, reason: String },
}
