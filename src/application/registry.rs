//! Route Registry
//!
//! Maps every route to the droplets currently serving it. All structural
//! changes go through one write lock; lookups take the read lock and hand out
//! `Arc` clones, so a caller never observes a half-applied mutation. Request
//! counters live on the droplets themselves and are updated without the lock.

use crate::application::active_apps::ActiveAppPublisher;
use crate::application::stats::{RouterStats, StatsSnapshot};
use crate::application::tag_metrics::TagAggregator;
use crate::domain::entities::{Droplet, Registration};
use crate::domain::services::RouteTraffic;
use crate::domain::value_objects::{NotFoundRedirect, RouteKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

type RouteTable = HashMap<RouteKey, Vec<Arc<Droplet>>>;

/// Outcome of resolving a route for an incoming request.
#[derive(Debug)]
pub enum Resolution<'a> {
    /// Droplets currently registered for the route
    Found(Vec<Arc<Droplet>>),
    /// Unknown route; write this fixed response back to the client
    Redirect(&'a str),
    /// Unknown route and no redirect configured
    NotFound,
}

/// The route -> droplets table and everything hanging off it.
pub struct Registry {
    routes: RwLock<RouteTable>,
    tags: Arc<TagAggregator>,
    stats: Arc<RouterStats>,
    notfound_redirect: Option<NotFoundRedirect>,
    active_apps: Option<Arc<ActiveAppPublisher>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            tags: Arc::new(TagAggregator::new()),
            stats: Arc::new(RouterStats::new()),
            notfound_redirect: None,
            active_apps: None,
        }
    }

    /// Answer unknown routes with a fixed redirect.
    pub fn with_notfound_redirect(mut self, redirect: NotFoundRedirect) -> Self {
        tracing::info!("registered 404 redirect at {}", redirect.location());
        self.notfound_redirect = Some(redirect);
        self
    }

    /// Feed the app id of every served request into an active-app publisher.
    pub fn with_active_apps(mut self, publisher: Arc<ActiveAppPublisher>) -> Self {
        self.active_apps = Some(publisher);
        self
    }

    pub fn tag_metrics(&self) -> &Arc<TagAggregator> {
        &self.tags
    }

    pub fn stats(&self) -> &Arc<RouterStats> {
        &self.stats
    }

    /// Droplets registered for `route`; empty if the route is unknown.
    pub fn lookup(&self, route: &str) -> Vec<Arc<Droplet>> {
        let key = RouteKey::new(route);
        self.routes.read().get(&key).cloned().unwrap_or_default()
    }

    /// Look up a route, falling back to the configured 404 redirect.
    pub fn resolve(&self, route: &str) -> Resolution<'_> {
        let droplets = self.lookup(route);
        if !droplets.is_empty() {
            return Resolution::Found(droplets);
        }
        match &self.notfound_redirect {
            Some(redirect) => Resolution::Redirect(redirect.response()),
            None => Resolution::NotFound,
        }
    }

    /// Register a droplet, or refresh it if `(route, host, port)` is known.
    ///
    /// Returns `true` when a new droplet was added. A heartbeat for a known
    /// droplet only moves its timestamp; tags and counters stay as they were.
    pub fn register(&self, registration: Registration) -> bool {
        let Registration {
            route,
            host,
            port,
            tags,
            app,
            session,
        } = registration;

        let (host, port) = match (host, port) {
            (Some(host), Some(port)) => (host, port),
            _ => {
                tracing::warn!("ignoring registration for {} without host and port", route);
                return false;
            }
        };
        let key = RouteKey::new(&route);

        // Heartbeats are the common case and only need the read lock
        if self.touch_existing(&key, &host, port) {
            return false;
        }

        let droplet = {
            let mut routes = self.routes.write();
            let droplets = routes.entry(key.clone()).or_default();

            if let Some(existing) = droplets.iter().find(|d| d.matches(&host, port)) {
                existing.touch();
                return false;
            }

            let droplet = Arc::new(Droplet::new(key.clone(), host, port, tags, app, session));
            droplets.push(droplet.clone());
            let available = droplets.len();

            self.stats.set_urls(routes.len());
            self.stats.droplet_added();

            tracing::info!("registering {} at {}:{}", key, droplet.host, droplet.port);
            tracing::info!("{} servers available for {}", available, key);
            droplet
        };

        self.tags.ensure(&droplet.tags);
        true
    }

    /// Remove the droplet at `(route, host, port)`.
    ///
    /// Returns `true` if a droplet was removed. Unknown routes or endpoints are
    /// not an error.
    pub fn unregister(&self, route: &str, host: &str, port: u16) -> bool {
        let key = RouteKey::new(route);
        tracing::info!("unregistering {} for host {}:{}", key, host, port);

        let mut routes = self.routes.write();
        self.remove_locked(&mut routes, &key, host, port)
    }

    /// Count a proxied request served by `droplet` for `client`.
    pub fn record_request(&self, droplet: &Droplet, client: IpAddr) {
        self.stats.record_request();
        droplet.record_request(client);

        if let (Some(publisher), Some(app)) = (&self.active_apps, &droplet.app) {
            publisher.add(app);
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    pub fn droplet_count(&self) -> usize {
        self.routes.read().values().map(Vec::len).sum()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::capture(&self.stats, self.tags.snapshot())
    }

    /// Set every droplet's last-seen time to `at`. Returns how many were touched.
    pub(crate) fn touch_all(&self, at: Instant) -> usize {
        let routes = self.routes.read();
        let mut touched = 0;
        for droplet in routes.values().flatten() {
            droplet.touch_at(at);
            touched += 1;
        }
        touched
    }

    /// Unregister every droplet last seen more than `max_age` before `start`.
    ///
    /// Scan and removal run as separate passes under one write guard, so no
    /// registration interleaves with the sweep.
    pub(crate) fn evict_stale(&self, start: Instant, max_age: Duration) -> Vec<Arc<Droplet>> {
        let mut routes = self.routes.write();

        let to_drop: Vec<Arc<Droplet>> = routes
            .values()
            .flatten()
            .filter(|d| start.saturating_duration_since(d.last_seen()) > max_age)
            .cloned()
            .collect();

        for droplet in &to_drop {
            tracing::info!(
                "unregistering {} for host {}:{} (stale)",
                droplet.route,
                droplet.host,
                droplet.port
            );
            self.remove_locked(&mut routes, &droplet.route, &droplet.host, droplet.port);
        }
        to_drop
    }

    /// Drain every droplet's counters into per-route totals.
    pub(crate) fn drain_traffic(&self) -> Vec<RouteTraffic> {
        let routes = self.routes.read();
        routes
            .iter()
            .map(|(route, droplets)| {
                let mut requests = 0;
                let mut clients: HashMap<IpAddr, u64> = HashMap::new();
                for droplet in droplets {
                    requests += droplet.take_requests();
                    for (ip, count) in droplet.take_clients() {
                        *clients.entry(ip).or_insert(0) += count;
                    }
                }
                RouteTraffic {
                    route: route.clone(),
                    requests,
                    clients,
                }
            })
            .collect()
    }

    fn touch_existing(&self, key: &RouteKey, host: &str, port: u16) -> bool {
        let routes = self.routes.read();
        match routes
            .get(key)
            .and_then(|droplets| droplets.iter().find(|d| d.matches(host, port)))
        {
            Some(existing) => {
                existing.touch();
                true
            }
            None => false,
        }
    }

    fn remove_locked(&self, routes: &mut RouteTable, key: &RouteKey, host: &str, port: u16) -> bool {
        let Some(droplets) = routes.get_mut(key) else {
            tracing::info!("0 servers available for {}", key);
            return false;
        };

        let before = droplets.len();
        droplets.retain(|d| !d.matches(host, port));
        let removed = before - droplets.len();
        let remaining = droplets.len();

        if remaining == 0 {
            routes.remove(key);
        }

        self.stats.set_urls(routes.len());
        for _ in 0..removed {
            self.stats.droplet_removed();
        }

        tracing::info!("{} servers available for {}", remaining, key);
        removed > 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
