//! Core of the voice bridge: one caller transport joined to one realtime
//! conversation session, with barge-in, ordered playback and tool calls.
//!
//! Nothing in this crate knows about a concrete transport or model vendor;
//! those plug in through [`transport`] and [`session`].

pub mod error;
pub mod forwarder;
pub mod orchestrator;
pub mod profile;
pub mod registry;
pub mod session;
pub mod tool;
pub mod tools;
pub mod transport;
pub mod update;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use error::{
    BridgeError, ConfigurationError, RegistryError, SessionError, ToolError, TransportError,
};
pub use orchestrator::{CallSession, CallState};
pub use profile::{Agent, AgentCatalog, AgentProfile, TurnDetectionSettings};
pub use registry::ToolRegistry;
pub use session::{ConnectionSettings, ConversationSession, SessionConnector};
