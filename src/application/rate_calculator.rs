//! Rate Calculator
//!
//! Turns the request counters bumped on the hot path into requests-per-second
//! figures: globally, per route, and per client for the busiest routes. Each
//! sweep drains the droplet counters, so a sweep always measures the traffic
//! since the previous one.

use crate::application::registry::Registry;
use crate::domain::services::{RouteRate, TopTalkers};
use crate::infrastructure::periodic::spawn_periodic;
use crate::infrastructure::shutdown::ShutdownController;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Result of one rate sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateReport {
    /// Global requests per second
    pub requests_per_sec: u64,
    /// Every route with a nonzero rate, busiest first
    pub routes: Vec<RouteRate>,
}

impl RateReport {
    /// The standard top-talkers cut of [`routes`](Self::routes).
    pub fn top(&self) -> Vec<RouteRate> {
        TopTalkers::top(&self.routes)
    }
}

struct Baseline {
    at: Instant,
    total_requests: u64,
}

pub struct RateCalculator {
    registry: Arc<Registry>,
    expose_all_apps: bool,
    baseline: Mutex<Baseline>,
}

impl RateCalculator {
    pub fn new(registry: Arc<Registry>, expose_all_apps: bool) -> Self {
        Self::starting_at(registry, expose_all_apps, Instant::now())
    }

    /// Create a calculator whose first window opens at `at`.
    pub fn starting_at(registry: Arc<Registry>, expose_all_apps: bool, at: Instant) -> Self {
        let total_requests = registry.stats().requests();
        Self {
            registry,
            expose_all_apps,
            baseline: Mutex::new(Baseline { at, total_requests }),
        }
    }

    pub fn sweep(&self) -> RateReport {
        self.sweep_at(Instant::now())
    }

    /// Close the current window at `now` and publish its rates.
    pub fn sweep_at(&self, now: Instant) -> RateReport {
        let stats = self.registry.stats();

        let (elapsed, requests_per_sec) = {
            let mut baseline = self.baseline.lock();
            let elapsed = now.saturating_duration_since(baseline.at).as_secs_f64();
            let total = stats.requests();
            let delta = total.saturating_sub(baseline.total_requests);
            *baseline = Baseline {
                at: now,
                total_requests: total,
            };
            (elapsed, TopTalkers::rate(delta, elapsed))
        };

        let entries = self
            .registry
            .drain_traffic()
            .into_iter()
            .filter_map(|traffic| TopTalkers::route_rate(traffic, elapsed))
            .collect();
        let report = RateReport {
            requests_per_sec,
            routes: TopTalkers::rank(entries),
        };

        let all = self.expose_all_apps.then(|| report.routes.clone());
        stats.publish_rates(requests_per_sec, report.top(), all);

        tracing::debug!("calculated all request rates in {:?}", now.elapsed());
        report
    }

    /// Sweep on a fixed interval until shutdown.
    pub fn start(self: Arc<Self>, interval: Duration, shutdown: &ShutdownController) -> JoinHandle<()> {
        spawn_periodic("rate-calculator", interval, shutdown, move || {
            self.sweep();
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::Registration;
    use crate::domain::services::TOP_ROUTES;
    use std::net::{IpAddr, Ipv4Addr};

    fn client(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(172, 16, 0, last))
    }

    fn serve(registry: &Registry, route: &str, index: usize, count: u64, from: IpAddr) {
        let droplet = registry.lookup(route)[index].clone();
        for _ in 0..count {
            registry.record_request(&droplet, from);
        }
    }

    #[test]
    fn test_route_rate_and_reset() {
        let registry = Arc::new(Registry::new());
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8080));
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8081));

        let start = Instant::now();
        let calc = RateCalculator::starting_at(registry.clone(), false, start);

        serve(&registry, "app.vcap.me", 0, 30, client(1));
        serve(&registry, "app.vcap.me", 1, 70, client(2));

        let report = calc.sweep_at(start + Duration::from_secs(10));
        assert_eq!(report.requests_per_sec, 10);
        assert_eq!(report.routes.len(), 1);
        assert_eq!(report.routes[0].url.as_str(), "app.vcap.me");
        assert_eq!(report.routes[0].rps, 10);

        for droplet in registry.lookup("app.vcap.me") {
            assert_eq!(droplet.requests(), 0);
        }

        let quiet = calc.sweep_at(start + Duration::from_secs(20));
        assert_eq!(quiet.requests_per_sec, 0);
        assert!(quiet.routes.is_empty());
        assert_eq!(registry.stats().requests_per_sec(), 0);
        assert!(registry.stats().top10_app_requests().is_empty());
    }

    #[test]
    fn test_client_breakdown_merges_droplets() {
        let registry = Arc::new(Registry::new());
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8080));
        registry.register(Registration::new("app.vcap.me", "10.0.0.2", 8080));

        let start = Instant::now();
        let calc = RateCalculator::starting_at(registry.clone(), false, start);

        serve(&registry, "app.vcap.me", 0, 4, client(1));
        serve(&registry, "app.vcap.me", 1, 6, client(1));
        serve(&registry, "app.vcap.me", 1, 2, client(2));

        let report = calc.sweep_at(start + Duration::from_secs(1));
        let clients = report.routes[0].clients.clone().unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].ip, client(1));
        assert_eq!(clients[0].rps, 10);
        assert_eq!(clients[1].rps, 2);
    }

    #[test]
    fn test_top_talkers_ordering() {
        let registry = Arc::new(Registry::new());
        for (i, route) in ["a.com", "b.com", "c.com", "d.com", "idle.com"].iter().enumerate() {
            registry.register(Registration::new(*route, "10.0.0.1", 8000 + i as u16));
        }

        let start = Instant::now();
        let calc = RateCalculator::starting_at(registry.clone(), false, start);

        serve(&registry, "a.com", 0, 5, client(1));
        serve(&registry, "b.com", 0, 1, client(1));
        serve(&registry, "c.com", 0, 9, client(1));
        serve(&registry, "d.com", 0, 3, client(1));

        calc.sweep_at(start + Duration::from_secs(1));

        let top = registry.stats().top10_app_requests();
        let rates: Vec<u64> = top.iter().map(|r| r.rps).collect();
        assert_eq!(rates, vec![9, 5, 3, 1]);
        assert!(registry.stats().top_app_requests().is_none());
    }

    #[test]
    fn test_top_ten_cut_and_expose_all() {
        let registry = Arc::new(Registry::new());
        for i in 1..=12u16 {
            registry.register(Registration::new(format!("r{}.com", i), "10.0.0.1", i));
        }

        let start = Instant::now();
        let calc = RateCalculator::starting_at(registry.clone(), true, start);
        for i in 1..=12u64 {
            serve(&registry, &format!("r{}.com", i), 0, i, client(1));
        }

        let report = calc.sweep_at(start + Duration::from_secs(1));
        assert_eq!(report.routes.len(), 12);
        assert_eq!(registry.stats().top10_app_requests().len(), TOP_ROUTES);
        assert_eq!(registry.stats().top10_app_requests()[0].rps, 12);
        assert_eq!(registry.stats().top_app_requests().unwrap().len(), 12);
    }

    #[test]
    fn test_zero_elapsed_window_reports_zero() {
        let registry = Arc::new(Registry::new());
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8080));

        let start = Instant::now();
        let calc = RateCalculator::starting_at(registry.clone(), false, start);
        serve(&registry, "app.vcap.me", 0, 50, client(1));

        let report = calc.sweep_at(start);
        assert_eq!(report.requests_per_sec, 0);
        assert!(report.routes.is_empty());
    }

    #[test]
    fn test_sweep_during_traffic_loses_no_requests() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        const THREADS: u8 = 4;
        const PER_THREAD: u64 = 20_000;

        let registry = Arc::new(Registry::new());
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8080));
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8081));

        let start = Instant::now();
        let calc = RateCalculator::starting_at(registry.clone(), false, start);
        let finished = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (1..=THREADS)
            .map(|t| {
                let registry = registry.clone();
                let finished = finished.clone();
                thread::spawn(move || {
                    let droplets = registry.lookup("app.vcap.me");
                    for i in 0..PER_THREAD {
                        registry.record_request(&droplets[(i % 2) as usize], client(t));
                    }
                    finished.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        // One-second windows make every rate equal to the raw count
        let mut window = 0;
        let mut global = 0;
        let mut route = 0;
        let mut clients = 0;
        let mut tally = |report: RateReport| {
            global += report.requests_per_sec;
            for entry in &report.routes {
                route += entry.rps;
                clients += entry.clients.iter().flatten().map(|c| c.rps).sum::<u64>();
            }
        };

        while finished.load(Ordering::SeqCst) < THREADS as usize {
            window += 1;
            tally(calc.sweep_at(start + Duration::from_secs(window)));
        }
        for h in handles {
            h.join().unwrap();
        }
        tally(calc.sweep_at(start + Duration::from_secs(window + 1)));

        let expected = THREADS as u64 * PER_THREAD;
        assert_eq!(global, expected);
        assert_eq!(route, expected);
        assert_eq!(clients, expected);
        for droplet in registry.lookup("app.vcap.me") {
            assert_eq!(droplet.requests(), 0);
        }
    }
}
