//! Runs one call per accepted WebSocket.

use super::transport;
use crate::state::AppState;
use axum::{
    extract::{
        Path, State,
        ws::{WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use voicebridge_core::transport::TransportSink;
use voicebridge_core::{Agent, CallSession};

/// Axum handler that upgrades to a media-streaming WebSocket for `profile`.
///
/// An unknown profile is a 404 whether or not the request asked to upgrade.
pub async fn ws_handler(
    Path(profile): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(agent) = state.catalog.get(&profile).cloned() else {
        warn!(%profile, "Rejecting call for unknown agent profile");
        return (
            StatusCode::NOT_FOUND,
            format!("unknown agent profile '{profile}'"),
        )
            .into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let calls = state.calls.clone();
    ws.on_upgrade(move |socket| calls.track_future(handle_socket(socket, agent, state)))
}

#[instrument(name = "call", skip_all, fields(profile = %agent.profile.name, call_id))]
async fn handle_socket(socket: WebSocket, agent: Agent, state: Arc<AppState>) {
    info!("Call accepted");
    let (source, mut sink) = transport::split(socket);

    let settings = state.config.connection_settings();
    let call = match CallSession::establish(&agent, &settings, state.connector.as_ref()).await {
        Ok(call) => call,
        Err(e) => {
            error!(error = %e, "Failed to start call");
            sink.close().await;
            return;
        }
    };
    tracing::Span::current().record("call_id", tracing::field::display(call.id()));

    let run = call.clone().run(source, sink);
    tokio::pin!(run);
    let result = tokio::select! {
        biased;
        result = &mut run => result,
        _ = state.shutdown.cancelled() => {
            info!("Server shutting down; closing call");
            call.close();
            run.await
        }
    };
    if let Err(e) = result {
        error!(error = %e, "Call terminated with error");
    }
    info!("Call finished");
}
