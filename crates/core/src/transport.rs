//! The duplex channel to the caller, split into its receiving and sending halves.
//!
//! The inbound pump owns the [`TransportSource`] and the outbound forwarder owns
//! the [`TransportSink`], so neither half needs a lock.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// PCM16 audio from the caller.
    Audio(Bytes),
    /// Any non-audio frame; carries its kind for logging.
    Control(String),
}

#[async_trait]
pub trait TransportSource: Send {
    /// Waits for the next frame. `Ok(None)` means the peer closed the channel.
    async fn receive(&mut self) -> Result<Option<InboundFrame>, TransportError>;
}

#[async_trait]
pub trait TransportSink: Send {
    fn is_open(&self) -> bool;

    /// Writes one already-encoded outbound message.
    async fn send(&mut self, message: String) -> Result<(), TransportError>;

    /// Closes the channel. Safe to call on an already closed sink.
    async fn close(&mut self);
}
