//! Main Entrypoint for the Voice Bridge API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the agent catalog and the realtime connector.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use voicebridge_api::{
    config::Config, realtime::AzureRealtimeConnector, router::create_router, state::AppState,
};
use voicebridge_core::AgentCatalog;

const CALL_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Waits for live calls to finish closing, up to [`CALL_DRAIN_TIMEOUT`].
async fn drain_calls(state: &AppState) {
    let drained = tokio::time::timeout(CALL_DRAIN_TIMEOUT, state.drain_calls()).await;
    if drained.is_err() {
        warn!(
            active_calls = state.active_calls(),
            "Calls still open after shutdown timeout"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Build Agents and Connector ---
    let catalog = AgentCatalog::builtin(config.turn_detection)
        .context("Failed to build the agent catalog")?;
    let agents: Vec<&str> = catalog.names().collect();
    info!(?agents, "Agent catalog ready.");
    if config.connection_settings().validate().is_err() {
        warn!("Azure OpenAI connection settings are incomplete; calls will be refused.");
    }

    let bind_address = config.bind_address;
    let api_version = config.azure_api_version.clone();
    let app_state = Arc::new(AppState::new(
        config,
        catalog,
        Arc::new(AzureRealtimeConnector),
    ));

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state.clone()).layer(cors);

    // --- 5. Start Server ---
    info!(
        %api_version,
        %bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    let shutdown = app_state.shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        shutdown.cancel();
    })
    .await?;

    drain_calls(&app_state).await;
    info!("Server has shut down.");
    Ok(())
}
