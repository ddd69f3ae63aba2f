//! Staleness Sweeper
//!
//! Evicts droplets that stopped re-announcing themselves. While the control
//! channel is reconnecting, missing heartbeats say nothing about the backends,
//! so the sweep refreshes every droplet instead of pruning.

use crate::application::registry::Registry;
use crate::domain::ports::ControlChannel;
use crate::infrastructure::periodic::spawn_periodic;
use crate::infrastructure::shutdown::ShutdownController;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Default staleness threshold.
pub const DEFAULT_MAX_AGE_STALE: Duration = Duration::from_secs(120);

/// What a single sweep did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Channel reconnecting; timestamps refreshed, nothing evicted
    Suppressed { refreshed: usize },
    /// Stale droplets unregistered
    Pruned { evicted: usize },
}

pub struct StalenessSweeper {
    registry: Arc<Registry>,
    channel: Arc<dyn ControlChannel>,
    max_age: Duration,
}

impl StalenessSweeper {
    pub fn new(registry: Arc<Registry>, channel: Arc<dyn ControlChannel>, max_age: Duration) -> Self {
        Self {
            registry,
            channel,
            max_age,
        }
    }

    pub fn sweep(&self) -> SweepOutcome {
        self.sweep_at(Instant::now())
    }

    /// Sweep as if started at `start`.
    pub fn sweep_at(&self, start: Instant) -> SweepOutcome {
        if self.channel.is_reconnecting() {
            tracing::info!("suppressing checks on registered urls while reconnecting to mbus");
            let refreshed = self.registry.touch_all(start);
            return SweepOutcome::Suppressed { refreshed };
        }

        let evicted = self.registry.evict_stale(start, self.max_age).len();
        tracing::debug!(
            "checked all registered urls in {:?}, evicted {}",
            start.elapsed(),
            evicted
        );
        SweepOutcome::Pruned { evicted }
    }

    /// Sweep on a fixed interval until shutdown.
    pub fn start(self: Arc<Self>, interval: Duration, shutdown: &ShutdownController) -> JoinHandle<()> {
        spawn_periodic("staleness-sweeper", interval, shutdown, move || {
            self.sweep();
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::LocalBus;
    use crate::domain::entities::Registration;

    fn setup() -> (Arc<Registry>, Arc<LocalBus>, StalenessSweeper) {
        let registry = Arc::new(Registry::new());
        let bus = Arc::new(LocalBus::new());
        let sweeper = StalenessSweeper::new(registry.clone(), bus.clone(), DEFAULT_MAX_AGE_STALE);
        (registry, bus, sweeper)
    }

    #[test]
    fn test_stale_droplet_is_evicted() {
        let (registry, _bus, sweeper) = setup();
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8080));

        let start = registry.lookup("app.vcap.me")[0].last_seen() + Duration::from_secs(121);

        assert_eq!(sweeper.sweep_at(start), SweepOutcome::Pruned { evicted: 1 });
        assert!(registry.lookup("app.vcap.me").is_empty());
        assert_eq!(registry.stats().droplets(), 0);
        assert_eq!(registry.stats().urls(), 0);
    }

    #[test]
    fn test_fresh_droplet_survives() {
        let (registry, _bus, sweeper) = setup();
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8080));
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8081));

        let base = Instant::now();
        let start = base + Duration::from_secs(300);
        registry.lookup("app.vcap.me")[0].touch_at(base);
        registry.lookup("app.vcap.me")[1].touch_at(base + Duration::from_secs(240));

        assert_eq!(sweeper.sweep_at(start), SweepOutcome::Pruned { evicted: 1 });
        let remaining = registry.lookup("app.vcap.me");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].port, 8081);
    }

    #[test]
    fn test_reconnecting_refreshes_instead_of_evicting() {
        let (registry, bus, sweeper) = setup();
        registry.register(Registration::new("app.vcap.me", "10.0.0.1", 8080));
        registry.register(Registration::new("other.vcap.me", "10.0.0.2", 8080));

        let old = Instant::now();
        let start = old + Duration::from_secs(500);
        registry.lookup("app.vcap.me")[0].touch_at(old);

        bus.set_reconnecting(true);
        assert_eq!(sweeper.sweep_at(start), SweepOutcome::Suppressed { refreshed: 2 });

        let droplets = registry.lookup("app.vcap.me");
        assert_eq!(droplets.len(), 1);
        assert_eq!(droplets[0].last_seen(), start);

        // Once the channel is back the refreshed droplet is no longer stale
        bus.set_reconnecting(false);
        assert_eq!(
            sweeper.sweep_at(start + Duration::from_secs(10)),
            SweepOutcome::Pruned { evicted: 0 }
        );
        assert_eq!(registry.lookup("app.vcap.me").len(), 1);
    }

    #[test]
    fn test_sweep_empty_registry() {
        let (_registry, _bus, sweeper) = setup();
        assert_eq!(sweeper.sweep(), SweepOutcome::Pruned { evicted: 0 });
    }
}
