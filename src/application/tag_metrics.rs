//! Tag Aggregator
//!
//! Per tag key/value counters of responses by status class plus a rolling
//! latency window. Entries are created lazily and never evicted; the table is
//! bounded by the handful of distinct tag values in use.

use crate::domain::services::{RollingMetric, RollingSummary, DEFAULT_WINDOW};
use crate::domain::value_objects::{StatusClass, Tags};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Aggregates for one tag value.
#[derive(Debug)]
pub struct TagValueMetrics {
    requests: AtomicU64,
    responses: [AtomicU64; 5],
    latency: Mutex<RollingMetric>,
}

impl TagValueMetrics {
    fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            responses: Default::default(),
            latency: Mutex::new(RollingMetric::new(DEFAULT_WINDOW)),
        }
    }

    fn record(&self, status: StatusClass, latency_ms: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.responses[status.index()].fetch_add(1, Ordering::Relaxed);
        self.latency.lock().record(latency_ms);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn responses(&self, status: StatusClass) -> u64 {
        self.responses[status.index()].load(Ordering::Relaxed)
    }

    pub fn latency(&self) -> RollingSummary {
        self.latency.lock().summary()
    }

    pub fn snapshot(&self) -> TagValueSnapshot {
        TagValueSnapshot {
            requests: self.requests(),
            latency: self.latency(),
            responses_2xx: self.responses(StatusClass::Success),
            responses_3xx: self.responses(StatusClass::Redirection),
            responses_4xx: self.responses(StatusClass::ClientError),
            responses_5xx: self.responses(StatusClass::ServerError),
            responses_xxx: self.responses(StatusClass::Other),
        }
    }
}

/// Point-in-time copy of a [`TagValueMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagValueSnapshot {
    pub requests: u64,
    pub latency: RollingSummary,
    pub responses_2xx: u64,
    pub responses_3xx: u64,
    pub responses_4xx: u64,
    pub responses_5xx: u64,
    pub responses_xxx: u64,
}

/// Tag key -> tag value -> aggregates.
pub type TagSnapshot = BTreeMap<String, BTreeMap<String, TagValueSnapshot>>;

/// Table of per-tag aggregates.
#[derive(Debug, Default)]
pub struct TagAggregator {
    table: DashMap<String, DashMap<String, Arc<TagValueMetrics>>>,
}

impl TagAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure every tag pair has an entry. Existing entries are untouched.
    pub fn ensure(&self, tags: &Tags) {
        for (key, value) in tags.iter() {
            self.entry(key, value);
        }
    }

    /// Account one completed response against every tag of the serving droplet.
    pub fn record(&self, tags: &Tags, status: StatusClass, latency_ms: u64) {
        for (key, value) in tags.iter() {
            self.entry(key, value).record(status, latency_ms);
        }
    }

    /// Like [`record`](Self::record), taking the raw HTTP status code.
    pub fn record_status(&self, tags: &Tags, status: u16, latency_ms: u64) {
        self.record(tags, StatusClass::from_status(status), latency_ms);
    }

    pub fn get(&self, key: &str, value: &str) -> Option<Arc<TagValueMetrics>> {
        let values = self.table.get(key)?;
        let metrics = values.get(value)?;
        Some(metrics.value().clone())
    }

    /// Total number of tag key/value entries.
    pub fn len(&self) -> usize {
        self.table.iter().map(|values| values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> TagSnapshot {
        self.table
            .iter()
            .map(|values| {
                let inner: BTreeMap<_, _> = values
                    .iter()
                    .map(|m| (m.key().clone(), m.value().snapshot()))
                    .collect();
                (values.key().clone(), inner)
            })
            .collect()
    }

    fn entry(&self, key: &str, value: &str) -> Arc<TagValueMetrics> {
        if let Some(existing) = self.get(key, value) {
            return existing;
        }
        self.table
            .entry(key.to_string())
            .or_default()
            .entry(value.to_string())
            .or_insert_with(|| Arc::new(TagValueMetrics::new()))
            .clone()
    }
}
