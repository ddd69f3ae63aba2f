//! Status Server
//!
//! Operator-facing HTTP endpoints: `/healthz` for liveness and `/varz` for
//! the router's metrics snapshot.

use crate::application::Registry;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Status server state.
#[derive(Clone)]
pub struct StatusState {
    pub registry: Arc<Registry>,
}

/// HTTP server exposing router health and metrics.
pub struct StatusServer {
    listen_addr: String,
    state: StatusState,
}

impl StatusServer {
    pub fn new(listen_addr: String, registry: Arc<Registry>) -> Self {
        Self {
            listen_addr,
            state: StatusState { registry },
        }
    }

    /// Build the axum router (also used directly by tests).
    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(healthz_handler))
            .route("/varz", get(varz_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the status server.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("status endpoint listening on {}", self.listen_addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn healthz_handler() -> &'static str {
    "ok\n"
}

async fn varz_handler(State(state): State<StatusState>) -> impl IntoResponse {
    Json(state.registry.snapshot())
}
