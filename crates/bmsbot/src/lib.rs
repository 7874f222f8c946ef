//! bmsbot - chat bridge for BMS health
//!
//! Answers on-demand health questions in chat and pushes health
//! transitions from the BMS change feed to the channels whose routes match.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod consumer;
pub mod error;
pub mod slack;
pub mod source;

use std::sync::Arc;

use bms_router::{Notifier, Router};
use tracing::info;

pub use commands::{CommandKind, CommandRegistry};
pub use config::BotConfig;
pub use consumer::{ConsumerConfig, ConsumerState, ReconnectConfig, StreamConsumer};
pub use error::{BotError, Result};
pub use slack::SlackNotifier;
pub use source::{stream_url, HealthSource, HttpHealthSource};

/// Builds a router holding every route from the configuration.
///
/// # Errors
///
/// Returns `BotError::Router` if a route does not build.
pub fn build_router(config: &BotConfig, notifier: Arc<dyn Notifier>) -> Result<Router> {
    let router = Router::new(notifier);
    router.add_specs(&config.route_specs())?;

    info!(
        routes = router.len(),
        notifier = %router.notifier().name(),
        "router ready"
    );
    Ok(router)
}

/// Builds the change feed consumer for the configured source.
///
/// # Errors
///
/// Returns `BotError::Config` if the stream URL or settings are invalid.
pub fn build_consumer(
    config: &BotConfig,
    source: Arc<dyn HealthSource>,
    router: Arc<Router>,
) -> Result<StreamConsumer> {
    let consumer_config = ConsumerConfig::new(stream_url(&config.source)?.to_string())
        .with_accepted_kinds(config.accepted_kinds.iter().cloned())
        .with_reconnect(config.reconnect.to_reconnect_config());

    StreamConsumer::new(consumer_config, source, router)
}
