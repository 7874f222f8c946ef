//! Chat delivery through the Slack Web API.

use std::time::Duration;

use bms_router::{Message, Notifier, RouterError, SendFuture};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{BotError, Result};

/// Method used to post messages.
const POST_MESSAGE: &str = "chat.postMessage";

/// Request body for `chat.postMessage`.
#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    blocks: &'a [bms_router::Block],
}

/// The parts of a Web API response that matter here.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// [`Notifier`] that posts to Slack.
#[derive(Clone)]
pub struct SlackNotifier {
    endpoint: Url,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl SlackNotifier {
    /// Request timeout per delivery.
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a notifier posting through the API at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns `BotError::Config` if the token is empty or the base URL is
    /// invalid.
    pub fn new(api_base: &str, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(BotError::Config("slack token cannot be empty".to_string()));
        }

        let base = if api_base.ends_with('/') {
            api_base.to_string()
        } else {
            format!("{api_base}/")
        };
        let endpoint = Url::parse(&base)
            .and_then(|b| b.join(POST_MESSAGE))
            .map_err(|e| BotError::Config(format!("invalid slack api_base '{api_base}': {e}")))?;

        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;

        Ok(Self {
            endpoint,
            token,
            client,
        })
    }

    /// The `chat.postMessage` URL.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, channel: &str, message: &Message) -> std::result::Result<(), RouterError> {
        let delivery_error = |reason: String| RouterError::Delivery {
            channel: channel.to_string(),
            reason,
        };

        let body = PostMessage {
            channel,
            text: &message.text,
            blocks: &message.blocks,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| delivery_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(delivery_error(format!("HTTP {status}")));
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| delivery_error(e.to_string()))?;
        check_response(&api).map_err(delivery_error)?;

        debug!(channel = %channel, "posted message");
        Ok(())
    }
}

fn check_response(api: &ApiResponse) -> std::result::Result<(), String> {
    if api.ok {
        Ok(())
    } else {
        Err(api
            .error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string()))
    }
}

impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    fn send<'a>(&'a self, channel: &'a str, message: &'a Message) -> SendFuture<'a> {
        Box::pin(self.post(channel, message))
    }
}
