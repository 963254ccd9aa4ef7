//! Shared Application State
//!
//! Created once at startup and handed to every handler.

use crate::config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use voicebridge_core::{AgentCatalog, SessionConnector};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<AgentCatalog>,
    pub connector: Arc<dyn SessionConnector>,
    /// Every accepted call runs as a future tracked here.
    pub calls: TaskTracker,
    /// Cancelled when the server shuts down; live calls close themselves.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, catalog: AgentCatalog, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            connector,
            calls: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    /// Resolves once every tracked call has finished.
    pub async fn drain_calls(&self) {
        self.calls.close();
        self.calls.wait().await;
    }
}

#[cfg(test)]
impl AppState {
    /// State with the built-in catalog and no Azure connection parameters.
    pub(crate) fn for_tests() -> Self {
        use crate::realtime::AzureRealtimeConnector;
        use std::net::SocketAddr;
        use tracing::Level;
        use voicebridge_core::TurnDetectionSettings;

        let config = Config {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            azure_endpoint: None,
            azure_api_key: None,
            azure_deployment: None,
            azure_api_version: crate::config::DEFAULT_API_VERSION.to_string(),
            turn_detection: TurnDetectionSettings::default(),
            log_level: Level::INFO,
        };
        let catalog = AgentCatalog::builtin(config.turn_detection).unwrap();
        AppState::new(config, catalog, Arc::new(AzureRealtimeConnector))
    }
}
