//! Error types for bmsbot.

use thiserror::Error;

/// Errors that can occur in the bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The change feed could not be reached or broke mid-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The health API failed to answer.
    #[error("health source error: {0}")]
    Source(String),

    /// The health API has no resource by that name.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// A payload did not decode.
    #[error("protocol error: {0}")]
    Proto(#[from] bms_proto::ProtoError),

    /// Routing or delivery failed.
    #[error("router error: {0}")]
    Router(#[from] bms_router::RouterError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for BotError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        Self::Source(err.to_string())
    }
}

/// Result type for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;
