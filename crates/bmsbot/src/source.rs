//! Access to the BMS health API.
//!
//! The consumer only needs the full listing (to warm its cache); the
//! on-demand commands also look up single resources.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bms_proto::HealthUpdate;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{BotError, Result};

/// Path of the resource listing, relative to the API base.
pub const NAMESPACE_PATH: &str = "/ns/";

/// Path of the change feed, relative to the API base.
pub const STREAM_PATH: &str = "/ws/ns";

/// Boxed future returned by [`HealthSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Fetches current health from the API.
pub trait HealthSource: Send + Sync + fmt::Debug {
    /// Fetches every resource.
    ///
    /// # Errors
    ///
    /// Returns `BotError::Source` if the API cannot be reached or answers
    /// with an error, and `BotError::Proto` if a record does not decode.
    fn fetch_all(&self) -> SourceFuture<'_, Vec<HealthUpdate>>;

    /// Fetches one resource by name.
    ///
    /// # Errors
    ///
    /// Returns `BotError::NotFound` if no such resource exists.
    fn fetch_one<'a>(&'a self, name: &'a str) -> SourceFuture<'a, HealthUpdate>;
}

/// [`HealthSource`] backed by the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpHealthSource {
    base: Url,
    client: reqwest::Client,
}

impl HttpHealthSource {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a source for the API at `base`.
    ///
    /// # Errors
    ///
    /// Returns `BotError::Config` if `base` is not an `http`/`https` URL, or
    /// `BotError::Source` if the HTTP client cannot be built.
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| BotError::Config(format!("invalid source URL '{base}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(BotError::Config(format!(
                "source URL must be http or https, got '{}'",
                base.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self { base, client })
    }

    /// The API base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL of the full listing.
    ///
    /// # Errors
    ///
    /// Returns `BotError::Config` if the URL cannot be built.
    pub fn listing_url(&self) -> Result<Url> {
        self.base
            .join(NAMESPACE_PATH)
            .map_err(|e| BotError::Config(e.to_string()))
    }

    /// URL of one resource. The name is percent-encoded as a path segment.
    ///
    /// # Errors
    ///
    /// Returns `BotError::Config` if the URL cannot be built.
    pub fn resource_url(&self, name: &str) -> Result<Url> {
        let mut url = self.listing_url()?;
        url.path_segments_mut()
            .map_err(|()| BotError::Config(format!("cannot append to '{}'", self.base)))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<(StatusCode, Value)> {
        debug!(url = %url, "fetching health");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok((status, Value::Null));
        }
        let response = response.error_for_status()?;
        Ok((status, response.json().await?))
    }
}

impl HealthSource for HttpHealthSource {
    fn fetch_all(&self) -> SourceFuture<'_, Vec<HealthUpdate>> {
        Box::pin(async move {
            let url = self.listing_url()?;
            let (status, body) = self.get_json(url).await?;
            if status == StatusCode::NOT_FOUND {
                return Err(BotError::Source("listing endpoint not found".to_string()));
            }
            parse_listing(&body)
        })
    }

    fn fetch_one<'a>(&'a self, name: &'a str) -> SourceFuture<'a, HealthUpdate> {
        Box::pin(async move {
            let url = self.resource_url(name)?;
            let (status, body) = self.get_json(url).await?;
            if status == StatusCode::NOT_FOUND {
                return Err(BotError::NotFound(name.to_string()));
            }
            Ok(HealthUpdate::from_value(&body)?)
        })
    }
}

/// Decodes a listing response: a JSON array of health records.
///
/// # Errors
///
/// Returns `BotError::Source` if the body is not an array, and
/// `BotError::Proto` if any record does not decode.
pub fn parse_listing(body: &Value) -> Result<Vec<HealthUpdate>> {
    let records = body
        .as_array()
        .ok_or_else(|| BotError::Source("listing response is not an array".to_string()))?;

    records
        .iter()
        .map(|record| HealthUpdate::from_value(record).map_err(BotError::from))
        .collect()
}

/// Derives the change feed URL from the API base.
///
/// `https` becomes `wss`, anything else `ws`, and the path is replaced with
/// the feed path.
///
/// # Errors
///
/// Returns `BotError::Config` if `base` is not a valid URL.
pub fn stream_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| BotError::Config(format!("invalid source URL '{base}': {e}")))?;

    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| BotError::Config(format!("cannot derive stream URL from '{base}'")))?;

    url.join(STREAM_PATH)
        .map_err(|e| BotError::Config(e.to_string()))
}
