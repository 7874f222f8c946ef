//! Fan-out of transitions to matching channels.

use std::sync::Arc;
use std::time::Duration;

use bms_proto::HealthUpdate;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::builder::format_transition;
use crate::error::{Result, RouterError};
use crate::notifier::Notifier;
use crate::route::{Route, RouteSpec};
use crate::store::{MemoryRouteStore, RouteStore};

/// A delivery that did not go through.
#[derive(Debug)]
pub struct DeliveryFailure {
    /// Destination channel.
    pub channel: String,
    /// What went wrong.
    pub error: RouterError,
}

/// Outcome of routing one update.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Channels of every matching route, in route order.
    pub matched: Vec<String>,
    /// Number of successful deliveries.
    pub delivered: usize,
    /// One entry per failed delivery.
    pub failures: Vec<DeliveryFailure>,
}

impl FanOutReport {
    /// Returns true if every matched channel received the message.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Matches updates against routes and delivers transition messages.
#[derive(Debug, Clone)]
pub struct Router {
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn RouteStore>,
}

impl Router {
    /// Creates a router backed by an in-memory route store.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_store(notifier, Arc::new(MemoryRouteStore::new()))
    }

    /// Creates a router backed by the given route store.
    #[must_use]
    pub fn with_store(notifier: Arc<dyn Notifier>, store: Arc<dyn RouteStore>) -> Self {
        Self { notifier, store }
    }

    /// The notifier deliveries go through.
    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Adds a permanent route and returns its ID.
    pub fn add_route(&self, route: Route) -> String {
        self.store.add(route, None)
    }

    /// Builds and adds a route from its configuration form.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::InvalidRoute` or `RouterError::InvalidPattern`
    /// if the route spec does not build.
    pub fn add_spec(&self, spec: &RouteSpec) -> Result<String> {
        Ok(self.add_route(spec.build()?))
    }

    /// Adds several routes from configuration.
    ///
    /// Every spec is built before any is added, so a bad entry leaves the
    /// router unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first build error.
    pub fn add_specs<'a, I>(&self, specs: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a RouteSpec>,
    {
        let routes = specs
            .into_iter()
            .map(RouteSpec::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(routes.into_iter().map(|r| self.add_route(r)).collect())
    }

    /// Adds a route that stops matching after `ttl`.
    pub fn add_ephemeral_route(&self, route: Route, ttl: Duration) -> String {
        self.store.add(route, Some(ttl))
    }

    /// Removes a route by ID.
    pub fn remove_route(&self, id: &str) -> bool {
        self.store.remove(id)
    }

    /// Returns true if an equal live route exists.
    #[must_use]
    pub fn has_route(&self, route: &Route) -> bool {
        self.store.list().iter().any(|r| r == route)
    }

    /// Returns the live routes in evaluation order.
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        self.store.list()
    }

    /// Returns the number of live routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no live routes exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drops expired routes from the store.
    pub fn prune_expired(&self) -> usize {
        self.store.remove_expired()
    }

    /// Delivers the transition message for `update` to every matching route.
    ///
    /// The message is formatted once. Deliveries run concurrently and all
    /// complete before this returns; a failed delivery is logged and
    /// reported but does not stop the others.
    pub async fn process_update(&self, update: &HealthUpdate) -> FanOutReport {
        let matched: Vec<String> = self
            .store
            .list()
            .iter()
            .filter(|route| route.matches(update))
            .map(|route| route.channel().to_string())
            .collect();

        if matched.is_empty() {
            debug!(name = %update.name(), "no route matched");
            return FanOutReport::default();
        }

        let message = format_transition(update);
        let results = join_all(
            matched
                .iter()
                .map(|channel| self.notifier.send(channel, &message)),
        )
        .await;

        let mut delivered = 0;
        let mut failures = Vec::new();

        for (channel, result) in matched.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(
                        channel = %channel,
                        name = %update.name(),
                        error = %error,
                        "delivery failed"
                    );
                    failures.push(DeliveryFailure {
                        channel: channel.clone(),
                        error,
                    });
                }
            }
        }

        let report = FanOutReport {
            matched,
            delivered,
            failures,
        };

        info!(
            name = %update.name(),
            previous = %update.previous_category(),
            current = %update.category(),
            delivered = report.delivered,
            failed = report.failures.len(),
            "routed transition"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;
    use serde_json::json;

    fn namespace(name: &str, tenant: &str, env: &str) -> HealthUpdate {
        HealthUpdate::from_value(&json!({
            "kind": "Namespace",
            "name": name,
            "healthy": "False",
            "tenant": {"name": tenant, "env": env},
        }))
        .unwrap()
    }

    fn fleet() -> Vec<HealthUpdate> {
        vec![
            namespace("tenant1-prod", "tenant1", "prod"),
            namespace("tenant1-stage", "tenant1", "stage"),
            namespace("tenant1-dev", "tenant1", "dev"),
            namespace("tenant2-prod", "tenant2", "prod"),
            namespace("tenant2-stage", "tenant2", "stage"),
            namespace("tenant2-dev", "tenant2", "dev"),
        ]
    }

    fn setup() -> (Arc<RecordingNotifier>, Router) {
        let notifier = Arc::new(RecordingNotifier::new());
        let router = Router::new(notifier.clone());
        (notifier, router)
    }

    async fn route_fleet(router: &Router) {
        for update in fleet() {
            router.process_update(&update).await;
        }
    }

    #[tokio::test]
    async fn test_simple_namespaces() {
        let (notifier, router) = setup();
        router.add_route(Route::new("#tenant1", &["tenant1-prod", "tenant1-stage"], &[]).unwrap());

        route_fleet(&router).await;

        let deliveries = notifier.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|d| d.channel == "#tenant1"));
        assert!(deliveries[0].message.text.contains("tenant1-prod"));
        assert!(deliveries[1].message.text.contains("tenant1-stage"));
    }

    #[tokio::test]
    async fn test_regex_namespaces() {
        let (notifier, router) = setup();
        router.add_route(Route::new("#tenant1", &["/tenant1-(prod|stage)/"], &[]).unwrap());

        route_fleet(&router).await;

        assert_eq!(notifier.deliveries_to("#tenant1").len(), 2);
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn test_tenants() {
        let (notifier, router) = setup();
        router.add_route(Route::new::<&str>("#t2", &[], &["tenant2"]).unwrap());

        route_fleet(&router).await;

        assert_eq!(notifier.deliveries_to("#t2").len(), 3);
    }

    #[tokio::test]
    async fn test_k_of_n_routes() {
        let (notifier, router) = setup();
        router.add_route(Route::new("#prod", &["*-prod"], &[]).unwrap());
        router.add_route(Route::new::<&str>("#tenant1", &[], &["tenant1"]).unwrap());
        router.add_route(Route::new("#dev", &["*-dev"], &[]).unwrap());
        router.add_route(Route::new::<&str>("#tenant3", &[], &["tenant3"]).unwrap());

        let report = router
            .process_update(&namespace("tenant1-prod", "tenant1", "prod"))
            .await;

        assert_eq!(report.matched, ["#prod", "#tenant1"]);
        assert_eq!(report.delivered, 2);
        assert!(report.is_complete());
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn test_message_is_shared_across_channels() {
        let (notifier, router) = setup();
        router.add_route(Route::new("#a", &["*"], &[]).unwrap());
        router.add_route(Route::new("#b", &["*"], &[]).unwrap());

        router
            .process_update(&namespace("tenant1-prod", "tenant1", "prod"))
            .await;

        let deliveries = notifier.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].message, deliveries[1].message);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_channels() {
        let (notifier, router) = setup();
        notifier.fail_channel("#broken");
        router.add_route(Route::new("#before", &["*"], &[]).unwrap());
        router.add_route(Route::new("#broken", &["*"], &[]).unwrap());
        router.add_route(Route::new("#after", &["*"], &[]).unwrap());

        let report = router
            .process_update(&namespace("tenant1-prod", "tenant1", "prod"))
            .await;

        assert_eq!(report.matched.len(), 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].channel, "#broken");
        assert!(!report.is_complete());
        assert_eq!(notifier.deliveries_to("#before").len(), 1);
        assert_eq!(notifier.deliveries_to("#after").len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_channels_each_get_a_delivery() {
        let (notifier, router) = setup();
        router.add_route(Route::new("#ops", &["tenant1-*"], &[]).unwrap());
        router.add_route(Route::new::<&str>("#ops", &[], &["tenant1"]).unwrap());

        router
            .process_update(&namespace("tenant1-prod", "tenant1", "prod"))
            .await;

        assert_eq!(notifier.deliveries_to("#ops").len(), 2);
    }

    #[tokio::test]
    async fn test_no_match_no_delivery() {
        let (notifier, router) = setup();
        router.add_route(Route::new("#x", &["nothing"], &[]).unwrap());

        let report = router
            .process_update(&namespace("tenant1-prod", "tenant1", "prod"))
            .await;

        assert!(report.matched.is_empty());
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_ephemeral_route_expires() {
        let (notifier, router) = setup();
        router.add_ephemeral_route(Route::new("#gone", &["*"], &[]).unwrap(), Duration::ZERO);
        router.add_route(Route::new("#kept", &["*"], &[]).unwrap());

        router
            .process_update(&namespace("tenant1-prod", "tenant1", "prod"))
            .await;

        assert_eq!(notifier.deliveries_to("#gone").len(), 0);
        assert_eq!(notifier.deliveries_to("#kept").len(), 1);
        assert_eq!(router.prune_expired(), 1);
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_add_specs_is_all_or_nothing() {
        let (_, router) = setup();
        let specs = vec![
            RouteSpec::new("#good").with_namespaces(["a"]),
            RouteSpec::new("#bad"),
        ];

        assert!(router.add_specs(&specs).is_err());
        assert!(router.is_empty());

        let ids = router.add_specs(&specs[..1]).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_has_and_remove_route() {
        let (_, router) = setup();
        let route = Route::new("#ops", &["a-*"], &[]).unwrap();
        let id = router.add_route(route.clone());

        assert!(router.has_route(&route));
        assert!(!router.has_route(&Route::new("#ops", &["b-*"], &[]).unwrap()));
        assert!(router.remove_route(&id));
        assert!(!router.has_route(&route));
    }

    #[test]
    fn test_add_spec_rejects_invalid() {
        let (_, router) = setup();
        let err = router
            .add_spec(&RouteSpec::new("").with_namespaces(["a"]))
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidRoute { .. }));
    }
}
