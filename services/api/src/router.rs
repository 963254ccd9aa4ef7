//! Axum Router Configuration

use crate::{state::AppState, ws::ws_handler};
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_calls: usize,
    pub agents: Vec<String>,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_calls: state.active_calls(),
        agents: state.catalog.names().map(str::to_string).collect(),
    })
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agents/{profile}", get(ws_handler))
        .with_state(app_state)
}
