//! Status HTTP server.
//!
//! Exposes registry snapshots over HTTP for monitoring tools and the
//! library's web layer.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::info;

use crate::job::{current_timestamp_ms, JobStatus, JobStatusView};
use crate::limiter::ConversionSlots;
use crate::registry::JobRegistry;

/// Errors that can occur when running the status server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(std::io::Error),

    #[error("Status server terminated: {0}")]
    Serve(std::io::Error),
}

/// Aggregate engine state served at GET /status
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub timestamp_unix_ms: i64,
    pub slot_capacity: usize,
    pub running: usize,
    pub queued: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub jobs: Vec<JobStatusView>,
}

#[derive(Clone)]
struct ServerState {
    registry: JobRegistry,
    slots: ConversionSlots,
}

async fn snapshot(state: &ServerState) -> EngineSnapshot {
    let jobs = state.registry.all_views().await;
    let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
    EngineSnapshot {
        timestamp_unix_ms: current_timestamp_ms(),
        slot_capacity: state.slots.capacity(),
        running: count(JobStatus::Converting),
        queued: count(JobStatus::Queued) + count(JobStatus::Starting),
        completed: count(JobStatus::Completed),
        failed: count(JobStatus::Failed),
        cancelled: count(JobStatus::Cancelled),
        jobs,
    }
}

/// Handler for GET /status
async fn get_status(State(state): State<ServerState>) -> Json<EngineSnapshot> {
    Json(snapshot(&state).await)
}

/// Handler for GET /jobs — active jobs only, oldest first
async fn get_jobs(State(state): State<ServerState>) -> Json<Vec<JobStatusView>> {
    Json(state.registry.active_views().await)
}

/// Creates the axum Router with status endpoints
pub fn create_status_router(registry: JobRegistry, slots: ConversionSlots) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/jobs", get(get_jobs))
        .with_state(ServerState { registry, slots })
}

/// Runs the status HTTP server on 127.0.0.1:`port`
pub async fn run_status_server(
    registry: JobRegistry,
    slots: ConversionSlots,
    port: u16,
) -> Result<(), ServerError> {
    let app = create_status_router(registry, slots);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(ServerError::BindError)?;
    info!(%addr, "status server listening");
    axum::serve(listener, app).await.map_err(ServerError::Serve)?;

    Ok(())
}
