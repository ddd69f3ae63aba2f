//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the router domain.
//! They have no external dependencies and contain only business logic.

use crate::domain::value_objects::{RouteKey, Tags};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A backend instance ("droplet") serving a route.
///
/// Identity is `(route, host, port)`. The descriptive attributes are fixed at
/// registration; the last-seen timestamp and the request counters are the only
/// mutable parts and each has its own cheap update path, so the request path
/// never needs the registry lock.
#[derive(Debug)]
pub struct Droplet {
    /// Route this droplet is registered under
    pub route: RouteKey,
    /// Backend host address
    pub host: String,
    /// Backend port
    pub port: u16,
    /// Application identifier
    pub app: Option<String>,
    /// Opaque session token handed to sticky clients
    pub session: Option<String>,
    /// Sanitized metadata tags
    pub tags: Tags,
    last_seen: Mutex<Instant>,
    requests: AtomicU64,
    clients: Mutex<HashMap<IpAddr, u64>>,
}

impl Droplet {
    /// Create a droplet from a validated registration.
    pub fn new(
        route: RouteKey,
        host: String,
        port: u16,
        tags: Tags,
        app: Option<String>,
        session: Option<String>,
    ) -> Self {
        Self {
            route,
            host,
            port,
            app,
            session,
            tags,
            last_seen: Mutex::new(Instant::now()),
            requests: AtomicU64::new(0),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this droplet is the `(host, port)` endpoint.
    pub fn matches(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }

    /// Session token, or an empty string when none was registered.
    pub fn session_cookie(&self) -> &str {
        self.session.as_deref().unwrap_or("")
    }

    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock()
    }

    /// Refresh the last-seen timestamp.
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&self, at: Instant) {
        *self.last_seen.lock() = at;
    }

    /// Count one proxied request from `client`.
    pub fn record_request(&self, client: IpAddr) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        *self.clients.lock().entry(client).or_insert(0) += 1;
    }

    /// Requests counted since the last rate sweep.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Read and zero the request counter.
    pub fn take_requests(&self) -> u64 {
        self.requests.swap(0, Ordering::Relaxed)
    }

    /// Read and clear the per-client counters.
    pub fn take_clients(&self) -> HashMap<IpAddr, u64> {
        std::mem::take(&mut *self.clients.lock())
    }
}

/// Arguments of a register call.
///
/// Host and port stay optional here because control-channel messages may omit
/// them; the registry refuses registrations without both.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub route: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tags: Tags,
    pub app: Option<String>,
    pub session: Option<String>,
}

impl Registration {
    pub fn new(route: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            route: route.into(),
            host: Some(host.into()),
            port: Some(port),
            ..Default::default()
        }
    }

    /// Attach raw tag pairs; pairs missing a key or a value are dropped.
    pub fn tags<I, K, V>(mut self, raw: I) -> Self
    where
        I: IntoIterator<Item = (Option<K>, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags = Tags::sanitize(raw);
        self
    }

    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }
}
