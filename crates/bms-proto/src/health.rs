//! Health snapshot types.
//!
//! This module provides:
//! - [`HealthCategory`]: the classification of a raw status token
//! - [`HealthUpdate`]: one resource's health snapshot, with room for the
//!   status it replaced

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{ProtoError, Result};

/// Classification of a raw `healthy` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthCategory {
    /// Token `true`.
    Healthy,
    /// Token `false`.
    Unhealthy,
    /// Token `warn`.
    Warning,
    /// Token `alert`.
    Alert,
    /// Anything else, including non-string tokens.
    Unknown,
}

impl HealthCategory {
    /// All categories in display order.
    pub const ALL: [Self; 5] = [
        Self::Healthy,
        Self::Unhealthy,
        Self::Warning,
        Self::Alert,
        Self::Unknown,
    ];

    /// Classifies a raw status token.
    ///
    /// Matching is case-insensitive and total: unrecognised strings and
    /// non-string values map to [`HealthCategory::Unknown`].
    #[must_use]
    pub fn classify(raw: &Value) -> Self {
        let Some(token) = raw.as_str() else {
            return Self::Unknown;
        };

        match token.to_ascii_lowercase().as_str() {
            "true" => Self::Healthy,
            "false" => Self::Unhealthy,
            "warn" => Self::Warning,
            "alert" => Self::Alert,
            _ => Self::Unknown,
        }
    }

    /// Returns the category name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Unhealthy => "Unhealthy",
            Self::Warning => "Warning",
            Self::Alert => "Alert",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns the chat emoji shortcode for this category.
    #[must_use]
    pub const fn icon(&self) -> &'static str {
        match self {
            Self::Healthy => ":white_check_mark:",
            Self::Unhealthy => ":x:",
            Self::Warning => ":warning:",
            Self::Alert => ":exclamation:",
            Self::Unknown => ":question:",
        }
    }

    /// Returns the boolean health flag.
    ///
    /// Warnings and alerts still count as healthy; only `false` and
    /// unrecognised tokens do not.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy | Self::Warning | Self::Alert)
    }
}

impl fmt::Display for HealthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resource's health snapshot.
///
/// Built fresh from every inbound payload. The only mutation allowed after
/// construction is [`HealthUpdate::set_previous_healthy_raw`], which the
/// stream consumer uses to carry diff context.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthUpdate {
    kind: String,
    name: String,
    namespace: String,
    tenant: Option<String>,
    env: Option<String>,
    healthy_raw: Value,
    previous_healthy_raw: Option<Value>,
    errors: Vec<String>,
    warnings: Vec<String>,
    alerts: Vec<String>,
}

impl HealthUpdate {
    /// Parses a JSON document into a health update.
    ///
    /// # Errors
    ///
    /// Returns `ProtoError::Decoding` for malformed JSON, otherwise the
    /// same errors as [`HealthUpdate::from_value`].
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Builds a health update from an untyped payload.
    ///
    /// # Errors
    ///
    /// - `ProtoError::Decoding` if the payload is not a JSON object
    /// - `ProtoError::MissingField` if `healthy`, `kind` or `name` is absent
    /// - `ProtoError::InvalidField` if `kind` or `name` is not a string
    pub fn from_value(payload: &Value) -> Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| ProtoError::Decoding("health payload must be a JSON object".into()))?;

        let healthy_raw = obj
            .get("healthy")
            .cloned()
            .ok_or(ProtoError::MissingField("healthy"))?;
        let kind = required_str(obj, "kind")?;
        let name = required_str(obj, "name")?;

        let namespace = obj
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let (tenant, env) = match obj.get("tenant") {
            Some(Value::Object(t)) => (
                t.get("name").and_then(Value::as_str).map(str::to_string),
                t.get("env").and_then(Value::as_str).map(str::to_string),
            ),
            Some(Value::String(t)) => (Some(t.clone()), None),
            _ => (None, None),
        };

        Ok(Self {
            kind,
            name,
            namespace,
            tenant,
            env,
            healthy_raw,
            previous_healthy_raw: None,
            errors: string_list(obj, "errors"),
            warnings: string_list(obj, "warnings"),
            alerts: string_list(obj, "alerts"),
        })
    }

    /// Resource type tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Resource identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning namespace, empty when not provided.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Tenant name, if the payload carried one.
    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// Tenant environment, if the payload carried one.
    #[must_use]
    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    /// The raw status token as received.
    #[must_use]
    pub const fn healthy_raw(&self) -> &Value {
        &self.healthy_raw
    }

    /// The status token this update superseded, if one was recorded.
    #[must_use]
    pub const fn previous_healthy_raw(&self) -> Option<&Value> {
        self.previous_healthy_raw.as_ref()
    }

    /// Records the status token of the cached update this one replaces.
    pub fn set_previous_healthy_raw(&mut self, raw: Value) {
        self.previous_healthy_raw = Some(raw);
    }

    /// Boolean health flag derived from the raw token.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.category().is_healthy()
    }

    /// Category derived from the raw token.
    #[must_use]
    pub fn category(&self) -> HealthCategory {
        HealthCategory::classify(&self.healthy_raw)
    }

    /// Category of the superseded token; `Unknown` when none was recorded.
    #[must_use]
    pub fn previous_category(&self) -> HealthCategory {
        self.previous_healthy_raw
            .as_ref()
            .map_or(HealthCategory::Unknown, HealthCategory::classify)
    }

    /// Returns true if the category differs from the previous one.
    #[must_use]
    pub fn is_transition(&self) -> bool {
        self.category() != self.previous_category()
    }

    /// Error messages, in the order received.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Warning messages, in the order received.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Alert messages, in the order received.
    #[must_use]
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// One-line description, e.g. `[Namespace] foo state: Healthy`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("[{}] {} state: {}", self.kind, self.name, self.category())
    }
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String> {
    match obj.get(field) {
        None => Err(ProtoError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ProtoError::InvalidField {
            field,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn string_list(obj: &Map<String, Value>, field: &str) -> Vec<String> {
    let Some(Value::Array(items)) = obj.get(field) else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}
