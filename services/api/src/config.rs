use secrecy::SecretString;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use voicebridge_core::{ConnectionSettings, TurnDetectionSettings};

pub const DEFAULT_API_VERSION: &str = "2024-10-01-preview";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Realtime connection parameters are optional here; a call that needs them
/// fails its own bootstrap when they are absent.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<SecretString>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: String,
    pub turn_detection: TurnDetectionSettings,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let azure_endpoint = std::env::var("AZURE_OPENAI_ENDPOINT").ok();
        let azure_api_key = std::env::var("AZURE_OPENAI_API_KEY")
            .ok()
            .map(SecretString::from);
        let azure_deployment = std::env::var("AZURE_OPENAI_DEPLOYMENT").ok();
        let azure_api_version = std::env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        let threshold: f32 = parse_var("VAD_THRESHOLD", "0.5")?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue(
                "VAD_THRESHOLD".to_string(),
                format!("{threshold} is outside 0.0..=1.0"),
            ));
        }
        let prefix_padding_ms: u64 = parse_var("VAD_PREFIX_PADDING_MS", "500")?;
        let silence_duration_ms: u64 = parse_var("VAD_SILENCE_DURATION_MS", "500")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            azure_endpoint,
            azure_api_key,
            azure_deployment,
            azure_api_version,
            turn_detection: TurnDetectionSettings {
                threshold,
                prefix_padding: Duration::from_millis(prefix_padding_ms),
                silence_duration: Duration::from_millis(silence_duration_ms),
            },
            log_level,
        })
    }

    /// The per-call connection parameters, validated later by the bootstrap.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            endpoint: self.azure_endpoint.clone(),
            api_key: self.azure_api_key.clone(),
            deployment: self.azure_deployment.clone(),
            api_version: Some(self.azure_api_version.clone()),
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
