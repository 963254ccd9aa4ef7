//! JSON framing used on the media-streaming WebSocket.
//!
//! Inbound frames are discriminated by `kind`; only `AudioData` carries audio.
//! Outbound frames are either an audio chunk or a stop-audio control message.

use crate::error::TransportError;
use crate::transport::InboundFrame;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
#[serde(tag = "kind")]
enum InboundMessage {
    AudioData {
        #[serde(rename = "audioData")]
        audio_data: AudioDataPayload,
    },
    AudioMetadata,
    #[serde(other)]
    Unknown,
}

/// Only the payload is read; timestamp, participant and silence flags are ignored.
#[derive(Deserialize, Debug)]
struct AudioDataPayload {
    data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OutboundMessage {
    kind: &'static str,
    audio_data: Option<OutboundAudio>,
    stop_audio: Option<StopAudio>,
}

#[derive(Serialize, Debug)]
struct OutboundAudio {
    data: String,
}

#[derive(Serialize, Debug)]
struct StopAudio {}

/// A frame queued for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Audio(Bytes),
    StopAudio,
}

impl OutboundFrame {
    /// Encodes the frame as a text WebSocket message.
    pub fn encode(&self) -> Result<String, TransportError> {
        let message = match self {
            OutboundFrame::Audio(pcm) => OutboundMessage {
                kind: "AudioData",
                audio_data: Some(OutboundAudio {
                    data: STANDARD.encode(pcm),
                }),
                stop_audio: None,
            },
            OutboundFrame::StopAudio => OutboundMessage {
                kind: "StopAudio",
                audio_data: None,
                stop_audio: Some(StopAudio {}),
            },
        };
        Ok(serde_json::to_string(&message)?)
    }
}

/// Decodes an inbound text frame.
pub fn decode_inbound(text: &str) -> Result<InboundFrame, TransportError> {
    let message: InboundMessage = serde_json::from_str(text)?;
    match message {
        InboundMessage::AudioData { audio_data } => {
            let pcm = STANDARD.decode(audio_data.data.as_bytes())?;
            Ok(InboundFrame::Audio(Bytes::from(pcm)))
        }
        InboundMessage::AudioMetadata => Ok(InboundFrame::Control("AudioMetadata".into())),
        InboundMessage::Unknown => Ok(InboundFrame::Control("Unknown".into())),
    }
}
