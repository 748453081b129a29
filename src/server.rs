// src/server.rs

//! HTTP trigger surface.
//!
//! `GET /poll` runs one cycle and answers `OK`, or 500 with a short
//! plain-text description. The underlying cause only goes to the log.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::Result;
use crate::pipeline::Poller;

/// Shared state threaded through handlers.
#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<Poller>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/poll", get(poll))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is interrupted.
pub async fn run_server(state: AppState, bind: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Poll on a fixed period, independent of HTTP triggers.
///
/// Overlap with `/poll` requests is fine; claims are atomic.
pub fn spawn_scheduler(poller: Arc<Poller>, period: Duration) -> JoinHandle<()> {
    info!("Polling every {}s", period.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = poller.poll().await {
                error!("Scheduled poll failed: {}: {}", e.description(), e);
            }
        }
    })
}

async fn poll(State(state): State<AppState>) -> impl IntoResponse {
    match state.poller.poll().await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            error!("{}: {}", e.description(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.description())
        }
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
