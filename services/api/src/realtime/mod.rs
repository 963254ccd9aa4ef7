//! Realtime conversation sessions backed by the Azure OpenAI realtime API.
//!
//! - `azure`: connecting, and the client half of the protocol.
//! - `events`: translation of server events into core updates.

mod azure;
mod events;

pub use azure::{AzureRealtimeConnector, RealtimeSession, realtime_url};
