//! Dashboard — read-only Axum API over the latest investor view.
//!
//! CORS enabled for local development. Nothing here can submit an action;
//! the dashboard only reflects what the poller and orchestrator publish.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

use crate::engine::orchestrator::SpinResolution;
use routes::AppState;

/// Bind the dashboard port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;

    info!(port, "Dashboard server starting on http://localhost:{port}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    });

    Ok(())
}

/// Mirror resolved spins into the dashboard until the sender goes away.
pub async fn follow_spins(state: AppState, mut spins: watch::Receiver<Option<SpinResolution>>) {
    while spins.changed().await.is_ok() {
        let latest = spins.borrow_and_update().clone();
        if let Some(spin) = latest {
            debug!(action_id = %spin.action_id, multiplier = spin.display.multiplier, "Dashboard recorded spin");
            state.record_spin(spin).await;
        }
    }
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/investor", get(routes::get_investor))
        .route("/api/history", get(routes::get_history))
        .route("/api/investors", get(routes::get_investors))
        .route("/api/outcomes", get(routes::get_outcomes))
        .route("/api/last-spin", get(routes::get_last_spin))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
