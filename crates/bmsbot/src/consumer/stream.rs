//! Change feed consumer.

use std::collections::HashMap;
use std::sync::Arc;

use bms_proto::{HealthUpdate, StreamEnvelope, DEFAULT_ACCEPTED_KINDS};
use bms_router::{FanOutReport, Router};
use futures::StreamExt;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};
use url::Url;

use super::reconnect::{Backoff, ReconnectConfig};
use super::state::{AtomicConsumerState, ConsumerState};
use crate::error::{BotError, Result};
use crate::source::HealthSource;

/// Settings for a [`StreamConsumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Change feed URL (`ws://` or `wss://`).
    pub url: String,
    /// Resource kinds to take from the feed.
    pub accepted_kinds: Vec<String>,
    /// Backoff between connection attempts.
    pub reconnect: ReconnectConfig,
}

impl ConsumerConfig {
    /// Creates a configuration for `url` with default kinds and backoff.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accepted_kinds: DEFAULT_ACCEPTED_KINDS.iter().map(|k| (*k).to_string()).collect(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Sets the accepted kinds.
    #[must_use]
    pub fn with_accepted_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the backoff.
    #[must_use]
    pub const fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Keeps the last known state of every resource and routes transitions.
///
/// One consumer owns one cache; messages are handled one at a time in
/// arrival order, and each routing call completes before the next message
/// is read.
#[derive(Debug)]
pub struct StreamConsumer {
    url: Url,
    envelope: StreamEnvelope,
    reconnect: ReconnectConfig,
    source: Arc<dyn HealthSource>,
    router: Arc<Router>,
    cache: HashMap<String, HealthUpdate>,
    state: Arc<AtomicConsumerState>,
}

impl StreamConsumer {
    /// Creates a consumer.
    ///
    /// # Errors
    ///
    /// Returns `BotError::Config` if the URL is malformed or not a websocket
    /// URL, the accepted kinds are empty, or the backoff waits are invalid.
    pub fn new(
        config: ConsumerConfig,
        source: Arc<dyn HealthSource>,
        router: Arc<Router>,
    ) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| BotError::Config(format!("invalid stream URL '{}': {e}", config.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(BotError::Config(format!(
                "stream URL must start with ws:// or wss://, got '{}'",
                config.url
            )));
        }

        if config.accepted_kinds.is_empty() {
            return Err(BotError::Config(
                "accepted kinds cannot be empty".to_string(),
            ));
        }

        config.reconnect.validate()?;

        Ok(Self {
            url,
            envelope: StreamEnvelope::new(&config.accepted_kinds),
            reconnect: config.reconnect,
            source,
            router,
            cache: HashMap::new(),
            state: Arc::new(AtomicConsumerState::default()),
        })
    }

    /// The change feed URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        self.state.load()
    }

    /// A handle for reading the state from another task.
    #[must_use]
    pub fn state_handle(&self) -> Arc<AtomicConsumerState> {
        Arc::clone(&self.state)
    }

    /// The cache of last known states, keyed by resource name.
    #[must_use]
    pub fn cache(&self) -> &HashMap<String, HealthUpdate> {
        &self.cache
    }

    /// The last known state of one resource.
    #[must_use]
    pub fn cached(&self, name: &str) -> Option<&HealthUpdate> {
        self.cache.get(name)
    }

    /// Runs until the feed closes normally.
    ///
    /// Connection failures, abnormal closes and failed cache warm-ups are
    /// retried after a backoff delay that doubles on each consecutive
    /// failure and resets once a connection is established and warmed.
    ///
    /// # Errors
    ///
    /// Does not currently fail; transport errors are retried.
    pub async fn run(&mut self) -> Result<()> {
        let mut backoff = Backoff::new(self.reconnect);

        loop {
            match self.session(&mut backoff).await {
                Ok(()) => {
                    info!(url = %self.url, "change feed closed");
                    self.state.store(ConsumerState::Disconnected);
                    return Ok(());
                }
                Err(e) => {
                    self.state.store(ConsumerState::Backoff);
                    let delay = backoff.next_delay();
                    warn!(
                        url = %self.url,
                        error = %e,
                        attempt = backoff.failures(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "change feed unavailable, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// One connection: connect, warm, stream.
    ///
    /// `Ok` means the server closed the feed normally.
    async fn session(&mut self, backoff: &mut Backoff) -> Result<()> {
        self.state.store(ConsumerState::Connecting);
        debug!(url = %self.url, "connecting to change feed");
        let (mut ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;

        self.state.store(ConsumerState::Warming);
        let warmed = self.warm_cache().await?;
        backoff.reset();
        info!(url = %self.url, resources = warmed, "connected to change feed");

        self.state.store(ConsumerState::Streaming);
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    self.handle_text(text.as_str()).await;
                }
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        self.handle_text(text).await;
                    }
                    Err(e) => warn!(error = %e, "skipping non-UTF-8 binary message"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "received close frame");
                    return match frame {
                        Some(frame) if !is_normal_close(frame.code) => {
                            Err(BotError::Transport(format!(
                                "change feed closed with code {}: {}",
                                u16::from(frame.code),
                                frame.reason.as_str()
                            )))
                        }
                        _ => Ok(()),
                    };
                }
                Ok(_) => {}
                Err(WsError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }

        Err(BotError::Transport(
            "change feed ended without a close frame".to_string(),
        ))
    }

    /// Replaces the cache with the full listing from the health source.
    ///
    /// # Errors
    ///
    /// Returns the source error; the cache is left untouched in that case.
    pub async fn warm_cache(&mut self) -> Result<usize> {
        let updates = self.source.fetch_all().await?;

        self.cache.clear();
        for update in updates {
            self.cache.insert(update.name().to_string(), update);
        }

        debug!(resources = self.cache.len(), "cache warmed");
        Ok(self.cache.len())
    }

    /// Decodes and handles one feed message.
    ///
    /// Dropped and malformed messages return `None`; malformed ones are
    /// logged.
    pub async fn handle_text(&mut self, text: &str) -> Option<FanOutReport> {
        match self.envelope.decode(text) {
            Ok(Some(update)) => self.handle_update(update).await,
            Ok(None) => {
                debug!("dropped feed message");
                None
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed feed message");
                None
            }
        }
    }

    /// Diffs an update against the cache and routes it if its category
    /// changed.
    ///
    /// The cache entry is always replaced. Returns the routing report when
    /// a transition was routed.
    pub async fn handle_update(&mut self, mut update: HealthUpdate) -> Option<FanOutReport> {
        if let Some(previous) = self.cache.get(update.name()) {
            update.set_previous_healthy_raw(previous.healthy_raw().clone());
        }

        let transition = update.is_transition();
        let name = update.name().to_string();
        self.cache.insert(name.clone(), update);

        if !transition {
            return None;
        }

        let update = self.cache.get(&name)?;
        Some(self.router.process_update(update).await)
    }
}

/// Close codes that end the feed for good; anything else is retried.
fn is_normal_close(code: CloseCode) -> bool {
    matches!(code, CloseCode::Normal | CloseCode::Away)
}
