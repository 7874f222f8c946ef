//! Error types for the bms-proto crate.

use thiserror::Error;

/// Errors that can occur while decoding health payloads.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// A required field was absent from the payload.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field was present but had an unusable value.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The payload could not be decoded at all.
    #[error("decoding error: {0}")]
    Decoding(String),
}

impl From<serde_json::Error> for ProtoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtoError>;
