//! Change feed consumer.
//!
//! Holds the websocket connection to the health API, keeps the last known
//! state of every resource, and hands transitions to the router. Lost
//! connections are retried with exponential backoff.

mod reconnect;
mod state;
mod stream;

pub use reconnect::{Backoff, ReconnectConfig};
pub use state::{AtomicConsumerState, ConsumerState};
pub use stream::{ConsumerConfig, StreamConsumer};
