//! edge-router - route registry and traffic statistics for a reverse proxy
//!
//! This is the composition root that wires together all the components.

use edge_router::adapters::inbound::{RegistrationHandler, StatusServer};
use edge_router::adapters::outbound::LocalBus;
use edge_router::application::{ActiveAppPublisher, RateCalculator, Registry, StalenessSweeper};
use edge_router::config::load_config;
use edge_router::domain::ports::ControlChannel;
use edge_router::infrastructure::{shutdown_signal, ShutdownController};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!("starting edge-router status={}", cfg.status_addr);

    // ===== COMPOSITION ROOT =====

    let shutdown = ShutdownController::new();

    // 1. Control channel. Nothing publishes registrations onto this bus yet;
    // the bridge to the platform's message bus plugs in here.
    let bus = Arc::new(LocalBus::new());
    let channel: Arc<dyn ControlChannel> = bus.clone();

    // 2. Registry, optionally tracking active apps and redirecting 404s
    let mut registry = Registry::new();
    if let Some(redirect) = cfg.notfound_redirect() {
        registry = registry.with_notfound_redirect(redirect);
    }
    if cfg.enable_nonprod_apps {
        let publisher = Arc::new(ActiveAppPublisher::new(channel.clone()));
        publisher
            .clone()
            .start(cfg.flush_apps_interval(), &shutdown);
        registry = registry.with_active_apps(publisher);
    }
    let registry = Arc::new(registry);

    // 3. Inbound registration protocol
    RegistrationHandler::new(registry.clone()).run(bus.subscribe(), &shutdown);

    // 4. Background sweepers
    Arc::new(StalenessSweeper::new(
        registry.clone(),
        channel.clone(),
        cfg.max_age_stale(),
    ))
    .start(cfg.check_interval(), &shutdown);

    Arc::new(RateCalculator::new(registry.clone(), cfg.expose_all_apps))
        .start(cfg.rps_interval(), &shutdown);

    // 5. Status endpoint until a signal arrives
    let server = StatusServer::new(cfg.status_addr.clone(), registry);
    tokio::select! {
        result = server.run() => result?,
        _ = shutdown_signal(shutdown.clone()) => {}
    }

    if !shutdown.wait_for_drain(DRAIN_TIMEOUT).await {
        tracing::warn!("{} background tasks still running at exit", shutdown.active_tasks());
    }
    tracing::info!("edge-router stopped");
    Ok(())
}
