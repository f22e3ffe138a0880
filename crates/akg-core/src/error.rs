//! Error types for canonical encoding.

use thiserror::Error;

/// A value could not be brought into canonical form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Value is not representable as canonical JSON: {0}")]
    Unrepresentable(String),

    #[error("Unsupported numeric value: {0}")]
    UnsupportedNumber(String),
}

impl From<serde_json::Error> for EncodingError {
    fn from(err: serde_json::Error) -> Self {
        EncodingError::Unrepresentable(err.to_string())
    }
}
