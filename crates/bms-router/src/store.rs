//! Route storage.
//!
//! Routes loaded from configuration live for the whole process. Routes
//! added at runtime may carry a time-to-live, after which they stop
//! matching. [`RouteStore`] is the seam for plugging in an external
//! store; [`MemoryRouteStore`] keeps everything in process.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::route::Route;

/// Storage for routes, with optional per-entry expiry.
pub trait RouteStore: Send + Sync + fmt::Debug {
    /// Returns the live routes in insertion order.
    fn list(&self) -> Vec<Route>;

    /// Stores a route and returns its ID. `None` means no expiry.
    fn add(&self, route: Route, ttl: Option<Duration>) -> String;

    /// Removes a route by ID. Returns `true` if it existed.
    fn remove(&self, id: &str) -> bool;

    /// Drops expired routes and returns how many were removed.
    fn remove_expired(&self) -> usize;

    /// Returns the number of live routes.
    fn len(&self) -> usize;

    /// Returns true if no live routes exist.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct StoredRoute {
    id: String,
    route: Route,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredRoute {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process route store.
#[derive(Debug, Default)]
pub struct MemoryRouteStore {
    routes: RwLock<Vec<StoredRoute>>,
}

impl MemoryRouteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the expiry time of a route, if it has one.
    #[must_use]
    pub fn expires_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.routes
            .read()
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.expires_at)
    }
}

impl RouteStore for MemoryRouteStore {
    fn list(&self) -> Vec<Route> {
        let now = Utc::now();
        self.routes
            .read()
            .iter()
            .filter(|r| r.is_live(now))
            .map(|r| r.route.clone())
            .collect()
    }

    fn add(&self, route: Route, ttl: Option<Duration>) -> String {
        let id = Uuid::new_v4().to_string();
        // A TTL too large for chrono is treated as no expiry.
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));

        info!(
            route_id = %id,
            channel = %route.channel(),
            expires_at = ?expires_at,
            "added route"
        );

        self.routes.write().push(StoredRoute {
            id: id.clone(),
            route,
            expires_at,
        });
        id
    }

    fn remove(&self, id: &str) -> bool {
        let mut routes = self.routes.write();
        let before = routes.len();
        routes.retain(|r| r.id != id);
        let removed = routes.len() != before;

        if removed {
            info!(route_id = %id, "removed route");
        }
        removed
    }

    fn remove_expired(&self) -> usize {
        let now = Utc::now();
        let mut routes = self.routes.write();
        let before = routes.len();
        routes.retain(|r| r.is_live(now));
        let removed = before - routes.len();

        if removed > 0 {
            debug!(removed, "pruned expired routes");
        }
        removed
    }

    fn len(&self) -> usize {
        let now = Utc::now();
        self.routes.read().iter().filter(|r| r.is_live(now)).count()
    }
}
