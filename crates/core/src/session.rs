//! Contract for the remote realtime conversation, plus the one-time bootstrap
//! that connects and configures it before a call goes active.

use crate::error::{BridgeError, ConfigurationError, SessionError};
use crate::profile::{AgentProfile, TurnDetectionSettings};
use crate::registry::ToolRegistry;
use crate::tool::ToolDefinition;
use crate::update::Update;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, instrument};

pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// A lazy, cancellable, non-restartable sequence of session updates.
pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<Update, SessionError>> + Send>>;

/// Connection parameters as supplied by configuration; any may be absent.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

/// Connection parameters that passed validation.
#[derive(Debug, Clone)]
pub struct Connection {
    pub endpoint: String,
    pub api_key: SecretString,
    pub deployment: String,
    pub api_version: Option<String>,
}

impl ConnectionSettings {
    /// Fails fast on the first missing or empty required parameter.
    pub fn validate(&self) -> Result<Connection, ConfigurationError> {
        fn required(value: Option<&str>, name: &'static str) -> Result<String, ConfigurationError> {
            match value.map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(ConfigurationError::MissingParameter(name)),
            }
        }

        let endpoint = required(self.endpoint.as_deref(), "endpoint")?;
        let api_key = required(
            self.api_key.as_ref().map(|k| k.expose_secret()),
            "api_key",
        )?;
        let deployment = required(self.deployment.as_deref(), "deployment")?;
        Ok(Connection {
            endpoint,
            api_key: SecretString::from(api_key),
            deployment,
            api_version: self.api_version.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Pcm16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionOptions {
    pub model: String,
}

/// Everything applied to the session by [`ConversationSession::configure`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    /// Present only when the profile asks for inbound transcription.
    pub transcription: Option<TranscriptionOptions>,
    pub turn_detection: TurnDetectionSettings,
    pub tools: Vec<ToolDefinition>,
}

impl SessionOptions {
    pub fn for_profile(profile: &AgentProfile, tools: &ToolRegistry) -> Self {
        Self {
            instructions: profile.instructions.clone(),
            voice: profile.voice.clone(),
            input_audio_format: AudioFormat::Pcm16,
            output_audio_format: AudioFormat::Pcm16,
            transcription: profile.transcription_enabled.then(|| TranscriptionOptions {
                model: TRANSCRIPTION_MODEL.to_string(),
            }),
            turn_detection: profile.turn_detection,
            tools: tools.definitions(),
        }
    }
}

/// A tool result appended to the conversation, addressed by the model's call id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallOutput {
    pub call_id: String,
    pub output: String,
}

/// The remote realtime session of one call.
///
/// Implementations must tolerate `send_audio` and `add_item` being called
/// concurrently from different tasks.
#[async_trait]
pub trait ConversationSession: Send + Sync {
    async fn configure(&self, options: &SessionOptions) -> Result<(), SessionError>;

    async fn send_audio(&self, pcm: Bytes) -> Result<(), SessionError>;

    async fn add_item(&self, output: FunctionCallOutput) -> Result<(), SessionError>;

    async fn start_response_turn(&self) -> Result<(), SessionError>;

    /// Hands out the update stream. Only the first call succeeds.
    fn updates(&self) -> Result<UpdateStream, SessionError>;

    /// Releases the session. Called once per call during teardown.
    async fn close(&self);
}

/// Opens new sessions against the remote endpoint.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        connection: &Connection,
    ) -> Result<Arc<dyn ConversationSession>, SessionError>;
}

/// Validates the settings, connects, and applies the profile to the new session.
///
/// Runs exactly once per call, before any audio flows in either direction.
#[instrument(skip_all, fields(profile = %profile.name))]
pub async fn bootstrap(
    settings: &ConnectionSettings,
    profile: &AgentProfile,
    tools: &ToolRegistry,
    connector: &dyn SessionConnector,
) -> Result<Arc<dyn ConversationSession>, BridgeError> {
    let connection = settings.validate()?;
    let session = connector.connect(&connection).await?;

    let options = SessionOptions::for_profile(profile, tools);
    if let Err(e) = session.configure(&options).await {
        session.close().await;
        return Err(e.into());
    }
    info!(
        voice = %options.voice,
        transcription = options.transcription.is_some(),
        tools = options.tools.len(),
        "Realtime session configured"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile;
    use crate::test_support::{FakeConnector, FakeSession};
    use crate::tools::HaircutStoreCalendarTool;

    fn full_settings() -> ConnectionSettings {
        ConnectionSettings {
            endpoint: Some("https://example.openai.azure.com".into()),
            api_key: Some(SecretString::from("key")),
            deployment: Some("gpt-4o-realtime".into()),
            api_version: None,
        }
    }

    #[test]
    fn test_validate_reports_each_missing_parameter() {
        let mut settings = full_settings();
        settings.endpoint = None;
        assert_eq!(
            settings.validate().unwrap_err(),
            ConfigurationError::MissingParameter("endpoint")
        );

        let mut settings = full_settings();
        settings.api_key = Some(SecretString::from(""));
        assert_eq!(
            settings.validate().unwrap_err(),
            ConfigurationError::MissingParameter("api_key")
        );

        let mut settings = full_settings();
        settings.deployment = Some("   ".into());
        assert_eq!(
            settings.validate().unwrap_err(),
            ConfigurationError::MissingParameter("deployment")
        );

        assert!(full_settings().validate().is_ok());
    }

    #[test]
    fn test_transcription_is_opt_in() {
        let tools = ToolRegistry::empty();
        let without = SessionOptions::for_profile(&profile::customer(), &tools);
        assert_eq!(without.transcription, None);

        let with = SessionOptions::for_profile(
            &profile::customer().with_transcription(true),
            &tools,
        );
        assert_eq!(
            with.transcription,
            Some(TranscriptionOptions {
                model: TRANSCRIPTION_MODEL.into()
            })
        );
        assert_eq!(with.input_audio_format, AudioFormat::Pcm16);
        assert_eq!(with.output_audio_format, AudioFormat::Pcm16);
    }

    #[tokio::test]
    async fn test_bootstrap_configures_the_new_session_once() {
        let session = FakeSession::new();
        let connector = FakeConnector::new(session.clone());
        let tools = ToolRegistry::new(vec![Arc::new(HaircutStoreCalendarTool)]).unwrap();
        let profile = profile::haircut_appointment();

        bootstrap(&full_settings(), &profile, &tools, &connector)
            .await
            .unwrap();

        let configured = session.configured();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].instructions, profile.instructions);
        assert_eq!(configured[0].tools.len(), 1);
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_fails_fast_without_connecting() {
        let session = FakeSession::new();
        let connector = FakeConnector::new(session.clone());
        let settings = ConnectionSettings::default();

        let err = bootstrap(
            &settings,
            &profile::customer(),
            &ToolRegistry::empty(),
            &connector,
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(
            err,
            BridgeError::Configuration(ConfigurationError::MissingParameter("endpoint"))
        ));
        assert_eq!(connector.connects(), 0);
        assert!(session.configured().is_empty());
    }
}
