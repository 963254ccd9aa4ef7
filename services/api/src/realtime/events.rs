use async_openai::types::realtime::{self as oai_realtime, ServerEvent as OAIServerEvent};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use tracing::{trace, warn};
use voicebridge_core::update::{CreatedItem, FunctionCall, Update};

/// Parses one text frame from the realtime socket.
///
/// Events this bridge has no use for, including ones the event model does not
/// know yet, become [`Update::Other`].
pub(crate) fn parse_server_event(text: &str) -> Update {
    match serde_json::from_str::<OAIServerEvent>(text) {
        Ok(OAIServerEvent::SessionCreated(_)) => Update::SessionStarted {
            session_id: session_id(text),
        },
        Ok(event) => to_update(event),
        Err(e) => {
            trace!(error = %e, "Ignoring unrecognised realtime event");
            Update::Other
        }
    }
}

fn to_update(event: OAIServerEvent) -> Update {
    match event {
        OAIServerEvent::InputAudioBufferSpeechStarted(_) => Update::SpeechStarted,
        OAIServerEvent::InputAudioBufferSpeechStopped(_) => Update::SpeechEnded,
        OAIServerEvent::ResponseOutputItemAdded(_) => Update::ItemStarted,
        OAIServerEvent::ResponseAudioDelta(e) => match STANDARD.decode(e.delta.as_bytes()) {
            Ok(pcm) => Update::AudioDelta(Bytes::from(pcm)),
            Err(err) => {
                warn!(error = %err, "Dropping audio delta with invalid base64");
                Update::Other
            }
        },
        OAIServerEvent::ResponseOutputItemDone(e) => Update::ItemFinished {
            function_call: function_call(&e.item),
            item_id: e.item.id,
        },
        OAIServerEvent::ConversationItemInputAudioTranscriptionCompleted(e) => {
            Update::InputTranscribed(e.transcript)
        }
        OAIServerEvent::ResponseDone(e) => Update::TurnFinished {
            created_items: e.response.output.iter().map(created_item).collect(),
        },
        OAIServerEvent::Error(e) => Update::Error(e.error.message),
        _ => Update::Other,
    }
}

fn is_function_call(item: &oai_realtime::Item) -> bool {
    matches!(item.r#type, Some(oai_realtime::ItemType::FunctionCall))
}

fn function_call(item: &oai_realtime::Item) -> Option<FunctionCall> {
    if !is_function_call(item) {
        return None;
    }
    Some(FunctionCall {
        name: item.name.clone()?,
        call_id: item.call_id.clone()?,
        arguments: item.arguments.clone().unwrap_or_default(),
    })
}

fn created_item(item: &oai_realtime::Item) -> CreatedItem {
    CreatedItem {
        item_id: item.id.clone(),
        function_name: if is_function_call(item) {
            item.name.clone()
        } else {
            None
        },
    }
}

fn session_id(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value["session"]["id"].as_str().map(str::to_string)
}
