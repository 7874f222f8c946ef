//! Routes: which resources notify which channel.

use bms_proto::HealthUpdate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};
use crate::pattern::Pattern;

/// Marker every channel name carries.
pub const CHANNEL_PREFIX: char = '#';

/// Route definition as it appears in configuration.
///
/// ```toml
/// [[routes]]
/// channel = "tenant1"
/// namespaces = ["tenant1-prod", "/tenant1-(stage|dev)/"]
/// tenants = ["tenant1"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Destination channel, with or without the leading `#`.
    pub channel: String,
    /// Patterns matched against the resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    /// Patterns matched against the resource's tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenants: Option<Vec<String>>,
}

impl RouteSpec {
    /// Creates a spec for the given channel with no patterns.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            namespaces: None,
            tenants: None,
        }
    }

    /// Sets the namespace patterns.
    #[must_use]
    pub fn with_namespaces<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the tenant patterns.
    #[must_use]
    pub fn with_tenants<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenants = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Compiles this route spec into a [`Route`].
    ///
    /// # Errors
    ///
    /// See [`Route::new`].
    pub fn build(&self) -> Result<Route> {
        Route::new(
            &self.channel,
            self.namespaces.as_deref().unwrap_or_default(),
            self.tenants.as_deref().unwrap_or_default(),
        )
    }
}

/// A compiled route.
///
/// Immutable once built. Two routes are equal when their channel and both
/// pattern lists are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    channel: String,
    namespaces: Vec<Pattern>,
    tenants: Vec<Pattern>,
}

impl Route {
    /// Builds a route, normalising the channel to carry a leading `#`.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::InvalidRoute` if:
    /// - the channel is empty
    /// - neither namespace nor tenant patterns are given
    ///
    /// Returns `RouterError::InvalidPattern` if a pattern does not compile.
    pub fn new<S: AsRef<str>>(channel: &str, namespaces: &[S], tenants: &[S]) -> Result<Self> {
        let trimmed = channel.trim();
        if trimmed.trim_start_matches(CHANNEL_PREFIX).is_empty() {
            return Err(RouterError::InvalidRoute {
                reason: "channel cannot be empty".to_string(),
            });
        }

        if namespaces.is_empty() && tenants.is_empty() {
            return Err(RouterError::InvalidRoute {
                reason: format!(
                    "route for {trimmed} must include namespace or tenant patterns"
                ),
            });
        }

        Ok(Self {
            channel: normalize_channel(trimmed),
            namespaces: compile_all(namespaces)?,
            tenants: compile_all(tenants)?,
        })
    }

    /// The destination channel, always starting with `#`.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Patterns matched against the resource name.
    #[must_use]
    pub fn namespaces(&self) -> &[Pattern] {
        &self.namespaces
    }

    /// Patterns matched against the tenant.
    #[must_use]
    pub fn tenants(&self) -> &[Pattern] {
        &self.tenants
    }

    /// Returns true if any tenant pattern matches the update's tenant or
    /// any namespace pattern matches the update's name.
    ///
    /// An update without a tenant never matches on tenant patterns.
    #[must_use]
    pub fn matches(&self, update: &HealthUpdate) -> bool {
        let tenant_match = update
            .tenant()
            .is_some_and(|tenant| self.tenants.iter().any(|p| p.is_match(tenant)));

        tenant_match || self.namespaces.iter().any(|p| p.is_match(update.name()))
    }

    /// Converts the route back to its configuration form.
    #[must_use]
    pub fn to_spec(&self) -> RouteSpec {
        let sources = |patterns: &[Pattern]| -> Option<Vec<String>> {
            (!patterns.is_empty())
                .then(|| patterns.iter().map(|p| p.source().to_string()).collect())
        };

        RouteSpec {
            channel: self.channel.clone(),
            namespaces: sources(&self.namespaces),
            tenants: sources(&self.tenants),
        }
    }
}

/// Prefixes a channel name with `#` unless it already has one.
#[must_use]
pub fn normalize_channel(channel: &str) -> String {
    if channel.starts_with(CHANNEL_PREFIX) {
        channel.to_string()
    } else {
        format!("{CHANNEL_PREFIX}{channel}")
    }
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|p| Pattern::parse(p.as_ref())).collect()
}
