//! Bot configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! source = "https://bms.example.com"
//! alert_channel = "health-alerts"
//! accepted_kinds = ["namespace"]
//!
//! [reconnect]
//! initial_wait_secs = 1
//! max_wait_secs = 60
//!
//! [[routes]]
//! channel = "tenant1"
//! namespaces = ["tenant1-*"]
//! ```
//!
//! The chat token is never read from this file.

use std::path::Path;
use std::time::Duration;

use bms_proto::DEFAULT_ACCEPTED_KINDS;
use bms_router::RouteSpec;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::consumer::ReconnectConfig;
use crate::error::{BotError, Result};

/// Default chat API base URL.
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Sample configuration written by `bmsbot init-config`.
pub const SAMPLE_CONFIG: &str = r#"# Base URL of the BMS health API.
source = "http://localhost:8080"

# Every transition is also posted here when set.
# alert_channel = "health-alerts"

# Resource kinds taken from the change feed.
accepted_kinds = ["namespace"]

[reconnect]
initial_wait_secs = 1
max_wait_secs = 60

[slack]
api_base = "https://slack.com/api"

[[routes]]
channel = "tenant1"
namespaces = ["tenant1-prod", "/tenant1-(stage|dev)/"]

[[routes]]
channel = "tenant2"
tenants = ["tenant2"]
"#;

/// Backoff settings for the change feed connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Wait after the first failure, in seconds.
    pub initial_wait_secs: u64,
    /// Longest wait between attempts, in seconds.
    pub max_wait_secs: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_wait_secs: 1,
            max_wait_secs: 60,
        }
    }
}

impl ReconnectSettings {
    /// Converts the settings to a [`ReconnectConfig`].
    #[must_use]
    pub const fn to_reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_wait: Duration::from_secs(self.initial_wait_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

/// Chat platform settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SlackSettings {
    /// Web API base URL.
    pub api_base: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
        }
    }
}

/// Main bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotConfig {
    /// Base URL of the health API.
    pub source: String,
    /// Channel that receives every transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_channel: Option<String>,
    /// Resource kinds taken from the change feed.
    #[serde(default = "default_accepted_kinds")]
    pub accepted_kinds: Vec<String>,
    /// Backoff settings.
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    /// Chat platform settings.
    #[serde(default)]
    pub slack: SlackSettings,
    /// Routing rules.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

fn default_accepted_kinds() -> Vec<String> {
    DEFAULT_ACCEPTED_KINDS.iter().map(|k| (*k).to_string()).collect()
}

impl BotConfig {
    /// Creates a configuration pointing at `source` with default settings.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            alert_channel: None,
            accepted_kinds: default_accepted_kinds(),
            reconnect: ReconnectSettings::default(),
            slack: SlackSettings::default(),
            routes: Vec::new(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BotError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| BotError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BotError::Config(format!("failed to serialize config: {e}")))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let source = Url::parse(&self.source)
            .map_err(|e| BotError::Config(format!("source is not a valid URL: {e}")))?;
        if !matches!(source.scheme(), "http" | "https") {
            return Err(BotError::Config(
                "source must start with http:// or https://".to_string(),
            ));
        }

        if self.accepted_kinds.is_empty() {
            return Err(BotError::Config(
                "accepted_kinds cannot be empty".to_string(),
            ));
        }

        if self.reconnect.initial_wait_secs == 0 {
            return Err(BotError::Config(
                "reconnect.initial_wait_secs must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.initial_wait_secs > self.reconnect.max_wait_secs {
            return Err(BotError::Config(
                "reconnect.initial_wait_secs cannot exceed reconnect.max_wait_secs".to_string(),
            ));
        }

        Url::parse(&self.slack.api_base)
            .map_err(|e| BotError::Config(format!("slack.api_base is not a valid URL: {e}")))?;

        for spec in self.route_specs() {
            spec.build()?;
        }

        Ok(())
    }

    /// Returns the configured routes, plus a catch-all route for the alert
    /// channel when one is set.
    #[must_use]
    pub fn route_specs(&self) -> Vec<RouteSpec> {
        let mut specs = self.routes.clone();
        if let Some(channel) = &self.alert_channel {
            specs.push(RouteSpec::new(channel.clone()).with_namespaces(["*"]));
        }
        specs
    }
}
