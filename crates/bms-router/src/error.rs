//! Error types for the bms-router crate.

use thiserror::Error;

/// Errors that can occur while building routes or delivering notifications.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Route configuration is unusable.
    #[error("invalid route: {reason}")]
    InvalidRoute {
        /// The reason the route is invalid.
        reason: String,
    },

    /// A match pattern failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern text as configured.
        pattern: String,
        /// The reason it was rejected.
        reason: String,
    },

    /// Delivering a message to one channel failed.
    #[error("delivery to {channel} failed: {reason}")]
    Delivery {
        /// The destination channel.
        channel: String,
        /// The reason delivery failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RouterError>;
