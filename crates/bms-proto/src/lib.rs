//! # bms-proto
//!
//! Data model for health snapshots published by the BMS health API.
//!
//! A [`HealthUpdate`] is built from the loosely-typed JSON the API serves
//! (both from the full listing endpoint and from the websocket change
//! feed). [`StreamEnvelope`] sits at the stream boundary and drops messages
//! that never reach the diff logic.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod health;

pub use envelope::{StreamEnvelope, DEFAULT_ACCEPTED_KINDS};
pub use error::{ProtoError, Result};
pub use health::{HealthCategory, HealthUpdate};
