//! Consumer state types.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Where the consumer loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsumerState {
    /// Not connected.
    Disconnected = 0,
    /// Opening the change feed.
    Connecting = 1,
    /// Loading the full listing into the cache.
    Warming = 2,
    /// Reading the change feed.
    Streaming = 3,
    /// Waiting before the next attempt.
    Backoff = 4,
}

impl ConsumerState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Warming => "warming",
            Self::Streaming => "streaming",
            Self::Backoff => "backoff",
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic wrapper for consumer state.
#[derive(Debug)]
pub struct AtomicConsumerState(AtomicU8);

impl AtomicConsumerState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: ConsumerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> ConsumerState {
        match self.0.load(Ordering::SeqCst) {
            1 => ConsumerState::Connecting,
            2 => ConsumerState::Warming,
            3 => ConsumerState::Streaming,
            4 => ConsumerState::Backoff,
            _ => ConsumerState::Disconnected,
        }
    }

    /// Store a new state.
    pub fn store(&self, state: ConsumerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Default for AtomicConsumerState {
    fn default() -> Self {
        Self::new(ConsumerState::Disconnected)
    }
}
