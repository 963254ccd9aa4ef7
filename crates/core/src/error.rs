//! Error taxonomy for the call bridge.
//!
//! Each collaborator boundary has its own error type so the orchestrator can
//! decide per kind whether a failure is soft (log and continue) or tears the
//! call down. [`BridgeError`] is the umbrella returned from call setup.

use thiserror::Error;

/// A required connection parameter is missing. Fatal before any loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("missing required connection parameter: {0}")]
    MissingParameter(&'static str),
}

/// Failures on the call's media/control channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("failed to receive from transport: {0}")]
    Receive(String),
    #[error("failed to send to transport: {0}")]
    Send(String),
    #[error("failed to encode or decode a frame: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid base64 audio payload: {0}")]
    Audio(#[from] base64::DecodeError),
}

/// Failures talking to the remote conversational session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to realtime session: {0}")]
    Connect(String),
    #[error("failed to send to realtime session: {0}")]
    Send(String),
    #[error("realtime update stream failed: {0}")]
    Stream(String),
    #[error("the update stream has already been consumed")]
    AlreadyConsumed,
    #[error("realtime session is closed")]
    Closed,
}

/// A tool could not produce a result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("tool failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is registered more than once")]
    DuplicateTool(String),
    #[error("agent profile '{0}' is registered more than once")]
    DuplicateProfile(String),
}

/// Umbrella error for establishing and running a call.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("call is not active (state: {0:?})")]
    NotActive(crate::orchestrator::CallState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::MissingParameter("endpoint");
        assert_eq!(
            err.to_string(),
            "missing required connection parameter: endpoint"
        );
    }

    #[test]
    fn test_bridge_error_is_transparent() {
        let err: BridgeError = SessionError::AlreadyConsumed.into();
        assert_eq!(
            err.to_string(),
            "the update stream has already been consumed"
        );
    }
}
