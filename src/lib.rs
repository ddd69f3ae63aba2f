//! edge-router Library
//!
//! This module exposes the router's registry, background sweepers and status
//! endpoint for use in integration tests and as a library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{RegistrationHandler, StatusServer};
pub use adapters::outbound::LocalBus;
pub use application::{
    ActiveAppPublisher, RateCalculator, Registry, Resolution, RouterStats, StalenessSweeper,
    TagAggregator,
};
pub use config::{load_config, Config};
pub use domain::entities::{Droplet, Registration};
pub use domain::ports::ControlChannel;
pub use domain::services::{RollingMetric, TopTalkers};
pub use domain::value_objects::{NotFoundRedirect, RouteKey, StatusClass, Tags};
