//! Stream boundary filter.
//!
//! The change feed carries more than the consumer cares about: `refresh`
//! actions and resource kinds other than the accepted ones are dropped here,
//! before any cache or diff logic sees them.

use serde_json::Value;

use crate::error::Result;
use crate::health::HealthUpdate;

/// Resource kinds accepted when nothing else is configured.
pub const DEFAULT_ACCEPTED_KINDS: &[&str] = &["namespace"];

/// The action value that marks a message as a periodic refresh.
const REFRESH_ACTION: &str = "refresh";

/// Decodes change-feed messages and filters out the ones to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEnvelope {
    accepted_kinds: Vec<String>,
}

impl StreamEnvelope {
    /// Creates an envelope accepting the given kinds (case-insensitive).
    #[must_use]
    pub fn new<I, S>(accepted_kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            accepted_kinds: accepted_kinds
                .into_iter()
                .map(|k| k.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Returns the accepted kinds, lower-cased.
    #[must_use]
    pub fn accepted_kinds(&self) -> &[String] {
        &self.accepted_kinds
    }

    /// Returns true if a message of this kind passes the filter.
    #[must_use]
    pub fn accepts_kind(&self, kind: &str) -> bool {
        self.accepted_kinds
            .iter()
            .any(|k| k.eq_ignore_ascii_case(kind))
    }

    /// Decodes one text message.
    ///
    /// Returns `Ok(None)` for messages that are dropped at the boundary.
    ///
    /// # Errors
    ///
    /// Returns a `ProtoError` if the message is not valid JSON or does not
    /// carry the required health fields.
    pub fn decode(&self, text: &str) -> Result<Option<HealthUpdate>> {
        let value: Value = serde_json::from_str(text)?;

        if value
            .get("action")
            .and_then(Value::as_str)
            .is_some_and(|a| a.eq_ignore_ascii_case(REFRESH_ACTION))
        {
            return Ok(None);
        }

        if let Some(kind) = value.get("kind").and_then(Value::as_str) {
            if !self.accepts_kind(kind) {
                return Ok(None);
            }
        }

        HealthUpdate::from_value(&value).map(Some)
    }
}

impl Default for StreamEnvelope {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTED_KINDS)
    }
}
