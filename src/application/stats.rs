//! Router Stats
//!
//! Process-wide counters and published rate metrics read by the status
//! endpoint.

use crate::application::tag_metrics::TagSnapshot;
use crate::domain::services::RouteRate;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live counters for the whole router.
#[derive(Debug, Default)]
pub struct RouterStats {
    requests: AtomicU64,
    bad_requests: AtomicU64,
    urls: AtomicUsize,
    droplets: AtomicUsize,
    requests_per_sec: AtomicU64,
    top10_app_requests: RwLock<Vec<RouteRate>>,
    top_app_requests: RwLock<Option<Vec<RouteRate>>>,
}

impl RouterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bad_request(&self) {
        self.bad_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn bad_requests(&self) -> u64 {
        self.bad_requests.load(Ordering::Relaxed)
    }

    /// Number of distinct routes.
    pub fn urls(&self) -> usize {
        self.urls.load(Ordering::Relaxed)
    }

    /// Number of registered droplets across all routes.
    pub fn droplets(&self) -> usize {
        self.droplets.load(Ordering::Relaxed)
    }

    pub fn requests_per_sec(&self) -> u64 {
        self.requests_per_sec.load(Ordering::Relaxed)
    }

    pub fn top10_app_requests(&self) -> Vec<RouteRate> {
        self.top10_app_requests.read().clone()
    }

    pub fn top_app_requests(&self) -> Option<Vec<RouteRate>> {
        self.top_app_requests.read().clone()
    }

    pub(crate) fn set_urls(&self, urls: usize) {
        self.urls.store(urls, Ordering::Relaxed);
    }

    pub(crate) fn droplet_added(&self) {
        self.droplets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn droplet_removed(&self) {
        // Registry mutation is serialized, so this never races below zero
        self.droplets.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn publish_rates(
        &self,
        requests_per_sec: u64,
        top10: Vec<RouteRate>,
        all: Option<Vec<RouteRate>>,
    ) {
        self.requests_per_sec
            .store(requests_per_sec, Ordering::Relaxed);
        *self.top10_app_requests.write() = top10;
        *self.top_app_requests.write() = all;
    }
}

/// Read-only view served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: &'static str,
    pub requests: u64,
    pub bad_requests: u64,
    pub urls: usize,
    pub droplets: usize,
    pub requests_per_sec: u64,
    pub top10_app_requests: Vec<RouteRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_app_requests: Option<Vec<RouteRate>>,
    pub tags: TagSnapshot,
}

impl StatsSnapshot {
    pub(crate) fn capture(stats: &RouterStats, tags: TagSnapshot) -> Self {
        Self {
            kind: "Router",
            version: env!("CARGO_PKG_VERSION"),
            requests: stats.requests(),
            bad_requests: stats.bad_requests(),
            urls: stats.urls(),
            droplets: stats.droplets(),
            requests_per_sec: stats.requests_per_sec(),
            top10_app_requests: stats.top10_app_requests(),
            top_app_requests: stats.top_app_requests(),
            tags,
        }
    }
}
