//! Reconnection configuration and exponential backoff.

use std::time::Duration;

use crate::error::{BotError, Result};

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay after the first failure.
    pub initial_wait: Duration,
    /// Maximum delay between attempts.
    pub max_wait: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl ReconnectConfig {
    /// Checks that the waits are usable.
    ///
    /// # Errors
    ///
    /// Returns `BotError::Config` if `initial_wait` is zero or greater than
    /// `max_wait`.
    pub fn validate(&self) -> Result<()> {
        if self.initial_wait.is_zero() {
            return Err(BotError::Config(
                "initial wait must be greater than 0".to_string(),
            ));
        }

        if self.initial_wait > self.max_wait {
            return Err(BotError::Config(format!(
                "initial wait ({:?}) cannot exceed max wait ({:?})",
                self.initial_wait, self.max_wait
            )));
        }

        Ok(())
    }
}

/// Doubling delay with a ceiling.
///
/// Each call to [`Backoff::next_delay`] returns the current delay and then
/// doubles it, up to `max_wait`. [`Backoff::reset`] goes back to
/// `initial_wait` after a successful connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current: Duration,
    failures: u32,
}

impl Backoff {
    /// Creates a backoff starting at `config.initial_wait`.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            current: config.initial_wait,
            failures: 0,
        }
    }

    /// Returns the delay to wait now and advances to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .unwrap_or(self.config.max_wait)
            .min(self.config.max_wait);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Returns the delay the next failure will wait.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Returns the number of consecutive failures since the last reset.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Goes back to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.config.initial_wait;
        self.failures = 0;
    }
}
