//! Periodic Tasks
//!
//! Fixed-interval background loops that stop rescheduling once shutdown has
//! been signalled.

use crate::infrastructure::shutdown::ShutdownController;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run `tick` every `interval` until shutdown.
///
/// The first run happens one full interval after spawning. Missed ticks are
/// delayed rather than bunched up, so a slow tick never causes a burst.
pub fn spawn_periodic<F>(
    name: &'static str,
    interval: Duration,
    shutdown: &ShutdownController,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    let mut stop = shutdown.subscribe();
    let already_stopped = shutdown.is_shutdown();
    let guard = shutdown.task_guard();

    tokio::spawn(async move {
        let _guard = guard;
        if already_stopped {
            return;
        }

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => tick(),
                _ = stop.recv() => {
                    tracing::debug!("{} task stopped", name);
                    break;
                }
            }
        }
    })
}
