//! Rolling Metric
//!
//! Fixed-width circular window of per-second aggregates. The current slot is
//! chosen from elapsed wall time, so a quiet period ages samples out even if
//! nothing is recorded.

use serde::Serialize;
use std::time::Instant;

/// Default window width in seconds.
pub const DEFAULT_WINDOW: usize = 60;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    /// Second this slot belongs to, plus one (zero marks an unused slot)
    epoch: u64,
    total: u64,
    samples: u64,
}

/// Windowed summary of a [`RollingMetric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RollingSummary {
    /// Samples recorded inside the window
    pub samples: u64,
    /// Sum of all sample values inside the window
    #[serde(skip)]
    pub total: u64,
    /// Mean sample value over the window
    pub value: u64,
}

/// Circular window recording one aggregate per second.
#[derive(Debug, Clone)]
pub struct RollingMetric {
    origin: Instant,
    slots: Vec<Slot>,
}

impl RollingMetric {
    /// Create a window of `width` one-second slots.
    pub fn new(width: usize) -> Self {
        Self::starting_at(width, Instant::now())
    }

    /// Create a window whose first slot begins at `origin`.
    pub fn starting_at(width: usize, origin: Instant) -> Self {
        Self {
            origin,
            slots: vec![Slot::default(); width.max(1)],
        }
    }

    pub fn width(&self) -> usize {
        self.slots.len()
    }

    pub fn record(&mut self, value: u64) {
        self.record_at(value, Instant::now());
    }

    /// Add a sample to the slot covering `at`, recycling the slot if it still
    /// holds an older second.
    pub fn record_at(&mut self, value: u64, at: Instant) {
        let tick = self.tick(at);
        let width = self.slots.len();
        let slot = &mut self.slots[(tick % width as u64) as usize];

        if slot.epoch != tick + 1 {
            *slot = Slot {
                epoch: tick + 1,
                total: 0,
                samples: 0,
            };
        }
        slot.total = slot.total.saturating_add(value);
        slot.samples += 1;
    }

    pub fn summary(&self) -> RollingSummary {
        self.summary_at(Instant::now())
    }

    /// Summarize the slots that fall inside the window ending at `at`.
    pub fn summary_at(&self, at: Instant) -> RollingSummary {
        let tick = self.tick(at);
        let width = self.slots.len() as u64;

        let (total, samples) = self
            .slots
            .iter()
            .filter(|slot| {
                if slot.epoch == 0 {
                    return false;
                }
                let second = slot.epoch - 1;
                second <= tick && tick - second < width
            })
            .fold((0u64, 0u64), |(total, samples), slot| {
                (total.saturating_add(slot.total), samples + slot.samples)
            });

        RollingSummary {
            samples,
            total,
            value: if samples == 0 { 0 } else { total / samples },
        }
    }

    fn tick(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.origin).as_secs()
    }
}

impl Default for RollingMetric {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
