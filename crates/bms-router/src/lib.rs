//! # bms-router
//!
//! Routing of health transitions to chat channels.
//!
//! A [`Route`] ties a channel to namespace and tenant [`Pattern`]s. The
//! [`Router`] holds routes in a [`RouteStore`], matches every transition
//! against them, formats the message once with the [`builder`] functions and
//! delivers it to all matching channels concurrently through a [`Notifier`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bms_proto::HealthUpdate;
//! use bms_router::{RecordingNotifier, Route, Router};
//!
//! # tokio_test_block(async {
//! let notifier = Arc::new(RecordingNotifier::new());
//! let router = Router::new(notifier.clone());
//! router.add_route(Route::new("#tenant1", &["tenant1-*"], &[]).unwrap());
//!
//! let update = HealthUpdate::from_json(
//!     r#"{"kind":"Namespace","name":"tenant1-prod","healthy":"False"}"#,
//! )
//! .unwrap();
//!
//! let report = router.process_update(&update).await;
//! assert_eq!(report.delivered, 1);
//! assert_eq!(notifier.deliveries_to("#tenant1").len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     futures::executor::block_on(f)
//! # }
//! ```
//!
//! # Patterns
//!
//! | written as            | kind    | matches                          |
//! |-----------------------|---------|----------------------------------|
//! | `tenant1-prod`        | literal | exactly `tenant1-prod`           |
//! | `tenant1-*`           | glob    | `tenant1-` followed by anything  |
//! | `/tenant1-[a-z]+/`    | regex   | the whole name against the regex |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod notifier;
pub mod pattern;
pub mod route;
pub mod router;
pub mod store;

pub use builder::{
    format_matches, format_overview, format_status_line, format_transition, Accessory, Block,
    Message, SelectOption, TextObject,
};
pub use error::{Result, RouterError};
pub use notifier::{Delivery, LogNotifier, Notifier, RecordingNotifier, SendFuture};
pub use pattern::{Pattern, PatternKind};
pub use route::{normalize_channel, Route, RouteSpec, CHANNEL_PREFIX};
pub use router::{DeliveryFailure, FanOutReport, Router};
pub use store::{MemoryRouteStore, RouteStore};
