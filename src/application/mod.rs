//! Application Layer
//!
//! The stateful router core: the registry and the periodic tasks that keep
//! it fresh and summarized.

pub mod active_apps;
pub mod rate_calculator;
pub mod registry;
pub mod staleness;
pub mod stats;
pub mod tag_metrics;

pub use active_apps::ActiveAppPublisher;
pub use rate_calculator::{RateCalculator, RateReport};
pub use registry::{Registry, Resolution};
pub use staleness::{StalenessSweeper, SweepOutcome, DEFAULT_MAX_AGE_STALE};
pub use stats::{RouterStats, StatsSnapshot};
pub use tag_metrics::{TagAggregator, TagSnapshot, TagValueMetrics, TagValueSnapshot};
