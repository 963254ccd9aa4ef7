//! Events produced by the remote conversational session.

use bytes::Bytes;

/// A model-initiated tool invocation, carried by a finished item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub call_id: String,
    /// The raw JSON argument string, passed to the tool untouched.
    pub arguments: String,
}

/// An item created while the model produced a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedItem {
    pub item_id: Option<String>,
    pub function_name: Option<String>,
}

impl CreatedItem {
    pub fn is_function_call(&self) -> bool {
        self.function_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// One event from the session's update stream, consumed in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    SessionStarted { session_id: Option<String> },
    /// Server VAD detected the caller talking.
    SpeechStarted,
    SpeechEnded,
    ItemStarted,
    /// Raw PCM16 audio produced by the model.
    AudioDelta(Bytes),
    ItemFinished {
        item_id: Option<String>,
        function_call: Option<FunctionCall>,
    },
    InputTranscribed(String),
    TurnFinished { created_items: Vec<CreatedItem> },
    Error(String),
    /// Any event kind this bridge does not react to.
    Other,
}

impl Update {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Update::SessionStarted { .. } => "session_started",
            Update::SpeechStarted => "speech_started",
            Update::SpeechEnded => "speech_ended",
            Update::ItemStarted => "item_started",
            Update::AudioDelta(_) => "audio_delta",
            Update::ItemFinished { .. } => "item_finished",
            Update::InputTranscribed(_) => "input_transcribed",
            Update::TurnFinished { .. } => "turn_finished",
            Update::Error(_) => "error",
            Update::Other => "other",
        }
    }
}
