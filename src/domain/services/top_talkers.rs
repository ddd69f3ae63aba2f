//! Top Talkers Service
//!
//! Pure domain logic turning per-route request totals into request rates and
//! ranking them. This service has NO external dependencies - it's pure Rust.

use crate::domain::value_objects::RouteKey;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;

/// Clients listed per route entry.
pub const TOP_CLIENTS: usize = 5;
/// Routes listed in the standard top-talkers metric.
pub const TOP_ROUTES: usize = 10;

/// Request totals for one route over a rate window.
#[derive(Debug, Clone)]
pub struct RouteTraffic {
    pub route: RouteKey,
    pub requests: u64,
    pub clients: HashMap<IpAddr, u64>,
}

/// Request rate of a single client against a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRate {
    pub ip: IpAddr,
    pub rps: u64,
}

/// Request rate of a route, with its heaviest clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRate {
    pub url: RouteKey,
    pub rps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<ClientRate>>,
}

/// Rate computation and ranking.
pub struct TopTalkers;

impl TopTalkers {
    /// Requests per second, truncated toward zero.
    ///
    /// A non-positive window yields zero rather than dividing by it.
    pub fn rate(count: u64, elapsed_secs: f64) -> u64 {
        if elapsed_secs <= 0.0 {
            return 0;
        }
        (count as f64 / elapsed_secs) as u64
    }

    /// Build the rate entry for a route, or `None` if its rate truncates to zero.
    pub fn route_rate(traffic: RouteTraffic, elapsed_secs: f64) -> Option<RouteRate> {
        let rps = Self::rate(traffic.requests, elapsed_secs);
        if rps == 0 {
            return None;
        }

        let mut clients: Vec<(IpAddr, u64)> = traffic.clients.into_iter().collect();
        clients.sort_unstable_by(|a, b| b.1.cmp(&a.1));
        let clients: Vec<ClientRate> = clients
            .into_iter()
            .take(TOP_CLIENTS)
            .map(|(ip, count)| ClientRate {
                ip,
                rps: Self::rate(count, elapsed_secs),
            })
            .collect();

        Some(RouteRate {
            url: traffic.route,
            rps,
            clients: if clients.is_empty() { None } else { Some(clients) },
        })
    }

    /// Sort entries by descending rate.
    pub fn rank(mut entries: Vec<RouteRate>) -> Vec<RouteRate> {
        entries.sort_by(|a, b| b.rps.cmp(&a.rps));
        entries
    }

    /// The leading `TOP_ROUTES` entries of an already ranked list.
    pub fn top(ranked: &[RouteRate]) -> Vec<RouteRate> {
        ranked.iter().take(TOP_ROUTES).cloned().collect()
    }
}
