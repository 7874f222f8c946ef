//! Delivery sinks for formatted messages.
//!
//! The [`Notifier`] trait is the seam to the chat platform. Implementations
//! here do not talk to any network: [`LogNotifier`] writes deliveries to the
//! log and [`RecordingNotifier`] keeps them in memory.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use parking_lot::Mutex;
use tracing::info;

use crate::builder::Message;
use crate::error::{Result, RouterError};

/// Boxed future returned by [`Notifier::send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Sends a message to a channel.
///
/// Channel names always start with `#`.
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Returns the name of this notifier.
    fn name(&self) -> &str;

    /// Delivers one message to one channel.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::Delivery` if the message cannot be delivered.
    fn send<'a>(&'a self, channel: &'a str, message: &'a Message) -> SendFuture<'a>;
}

/// A notifier that logs every delivery.
///
/// Used when no chat credentials are configured.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    name: String,
}

impl LogNotifier {
    /// Creates a log notifier with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("log")
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, channel: &'a str, message: &'a Message) -> SendFuture<'a> {
        Box::pin(async move {
            info!(
                notifier = %self.name,
                channel = %channel,
                blocks = message.blocks.len(),
                text = %message.text,
                "notification"
            );
            Ok(())
        })
    }
}

/// One message captured by a [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Destination channel.
    pub channel: String,
    /// Message as delivered.
    pub message: Message,
}

/// A notifier that keeps every delivery in memory.
///
/// Channels marked as failing reject their deliveries with
/// `RouterError::Delivery` and are not recorded.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deliveries to `channel` fail from now on.
    pub fn fail_channel(&self, channel: impl Into<String>) {
        self.failing.lock().insert(channel.into());
    }

    /// Returns a copy of everything delivered so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Returns the deliveries made to one channel.
    #[must_use]
    pub fn deliveries_to(&self, channel: &str) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.channel == channel)
            .cloned()
            .collect()
    }

    /// Returns the number of deliveries made so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.deliveries.lock().len()
    }

    /// Forgets everything delivered so far.
    pub fn clear(&self) {
        self.deliveries.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn send<'a>(&'a self, channel: &'a str, message: &'a Message) -> SendFuture<'a> {
        Box::pin(async move {
            if self.failing.lock().contains(channel) {
                return Err(RouterError::Delivery {
                    channel: channel.to_string(),
                    reason: "channel marked as failing".to_string(),
                });
            }

            self.deliveries.lock().push(Delivery {
                channel: channel.to_string(),
                message: message.clone(),
            });
            Ok(())
        })
    }
}
