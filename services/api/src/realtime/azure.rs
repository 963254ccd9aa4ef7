//! Client half of the Azure OpenAI realtime protocol.

use super::events::parse_server_event;
use async_openai::types::realtime::{self as oai_realtime, ClientEvent as OAIClientEvent};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{self, SplitSink, SplitStream},
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, protocol::Message as WsMessage},
};
use tracing::{debug, info, instrument, warn};
use voicebridge_core::SessionError;
use voicebridge_core::session::{
    AudioFormat, Connection, ConversationSession, FunctionCallOutput, SessionConnector,
    SessionOptions, UpdateStream,
};

type RealtimeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds the realtime socket URL for a validated connection.
///
/// Accepts the resource endpoint with or without scheme and trailing path,
/// e.g. `https://contoso.openai.azure.com/`.
pub fn realtime_url(connection: &Connection) -> Result<String, SessionError> {
    let endpoint = connection.endpoint.trim();
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("wss://"))
        .unwrap_or(endpoint);
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || rest.contains("://") {
        return Err(SessionError::Connect(format!(
            "endpoint '{}' has no usable host",
            connection.endpoint
        )));
    }

    let mut url = format!("wss://{host}/openai/realtime?");
    if let Some(version) = &connection.api_version {
        url.push_str(&format!("api-version={version}&"));
    }
    url.push_str(&format!("deployment={}", connection.deployment));
    Ok(url)
}

/// Opens one realtime socket per call.
#[derive(Debug, Default, Clone)]
pub struct AzureRealtimeConnector;

#[async_trait]
impl SessionConnector for AzureRealtimeConnector {
    #[instrument(skip_all, fields(deployment = %connection.deployment))]
    async fn connect(
        &self,
        connection: &Connection,
    ) -> Result<Arc<dyn ConversationSession>, SessionError> {
        let url = realtime_url(connection)?;
        let mut request = url
            .into_client_request()
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let api_key = HeaderValue::from_str(connection.api_key.expose_secret())
            .map_err(|e| SessionError::Connect(format!("invalid api key header: {e}")))?;
        request.headers_mut().insert("api-key", api_key);

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        info!("Connected to Azure OpenAI realtime API.");
        Ok(Arc::new(RealtimeSession::new(socket)))
    }
}

/// One realtime conversation. Client events are serialized through a single
/// writer lock; the read half is handed out once as the update stream.
pub struct RealtimeSession {
    writer: Mutex<SplitSink<RealtimeSocket, WsMessage>>,
    reader: std::sync::Mutex<Option<SplitStream<RealtimeSocket>>>,
}

impl RealtimeSession {
    fn new(socket: RealtimeSocket) -> Self {
        let (writer, reader) = socket.split();
        Self {
            writer: Mutex::new(writer),
            reader: std::sync::Mutex::new(Some(reader)),
        }
    }

    async fn send_event(&self, event: OAIClientEvent) -> Result<(), SessionError> {
        let text =
            serde_json::to_string(&event).map_err(|e| SessionError::Send(e.to_string()))?;
        self.writer
            .lock()
            .await
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| SessionError::Send(e.to_string()))
    }
}

#[async_trait]
impl ConversationSession for RealtimeSession {
    async fn configure(&self, options: &SessionOptions) -> Result<(), SessionError> {
        let event = OAIClientEvent::SessionUpdate(oai_realtime::SessionUpdateEvent {
            session: session_resource(options),
            event_id: None,
        });
        self.send_event(event).await
    }

    async fn send_audio(&self, pcm: Bytes) -> Result<(), SessionError> {
        let event = OAIClientEvent::InputAudioBufferAppend(oai_realtime::InputAudioBufferAppendEvent {
            audio: STANDARD.encode(&pcm),
            event_id: None,
        });
        self.send_event(event).await
    }

    async fn add_item(&self, output: FunctionCallOutput) -> Result<(), SessionError> {
        let item = oai_realtime::Item {
            r#type: Some(oai_realtime::ItemType::FunctionCallOutput),
            call_id: Some(output.call_id),
            output: Some(output.output),
            id: None,
            status: None,
            role: None,
            content: None,
            name: None,
            arguments: None,
        };
        let event = OAIClientEvent::ConversationItemCreate(oai_realtime::ConversationItemCreateEvent {
            item,
            event_id: None,
            previous_item_id: None,
        });
        self.send_event(event).await
    }

    async fn start_response_turn(&self) -> Result<(), SessionError> {
        let event = OAIClientEvent::ResponseCreate(oai_realtime::ResponseCreateEvent {
            response: None,
            event_id: None,
        });
        self.send_event(event).await
    }

    fn updates(&self) -> Result<UpdateStream, SessionError> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| SessionError::Closed)?
            .take()
            .ok_or(SessionError::AlreadyConsumed)?;

        let updates = stream::unfold(reader, |mut reader| async move {
            loop {
                match reader.next().await? {
                    Ok(WsMessage::Text(text)) => {
                        return Some((Ok(parse_server_event(text.as_str())), reader));
                    }
                    Ok(WsMessage::Close(frame)) => {
                        debug!(?frame, "Realtime socket closed by server");
                        return None;
                    }
                    Ok(_) => continue,
                    Err(e) => return Some((Err(SessionError::Stream(e.to_string())), reader)),
                }
            }
        });
        Ok(Box::pin(updates))
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            warn!(error = %e, "Failed to close realtime socket cleanly");
        }
    }
}

fn session_resource(options: &SessionOptions) -> oai_realtime::SessionResource {
    let turn_detection = options.turn_detection;
    oai_realtime::SessionResource {
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
        instructions: Some(options.instructions.clone()),
        voice: Some(voice(&options.voice)),
        input_audio_format: Some(audio_format(options.input_audio_format)),
        output_audio_format: Some(audio_format(options.output_audio_format)),
        input_audio_transcription: options.transcription.as_ref().map(|t| {
            oai_realtime::AudioTranscription {
                model: Some(t.model.clone()),
                ..Default::default()
            }
        }),
        turn_detection: Some(oai_realtime::TurnDetection::ServerVAD {
            threshold: turn_detection.threshold,
            prefix_padding_ms: millis(turn_detection.prefix_padding),
            silence_duration_ms: millis(turn_detection.silence_duration),
            interrupt_response: Some(true),
            create_response: Some(true),
        }),
        tools: (!options.tools.is_empty()).then(|| {
            options
                .tools
                .iter()
                .map(|tool| oai_realtime::ToolDefinition::Function {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                })
                .collect()
        }),
        ..Default::default()
    }
}

fn voice(name: &str) -> oai_realtime::RealtimeVoice {
    match name.to_ascii_lowercase().as_str() {
        "echo" => oai_realtime::RealtimeVoice::Echo,
        "shimmer" => oai_realtime::RealtimeVoice::Shimmer,
        "alloy" => oai_realtime::RealtimeVoice::Alloy,
        other => {
            warn!(voice = other, "Unsupported voice; falling back to alloy");
            oai_realtime::RealtimeVoice::Alloy
        }
    }
}

fn audio_format(format: AudioFormat) -> oai_realtime::AudioFormat {
    match format {
        AudioFormat::Pcm16 => oai_realtime::AudioFormat::PCM16,
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
