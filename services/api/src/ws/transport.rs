//! Adapts an axum WebSocket to the core transport contract.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    SinkExt, Stream, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};
use voicebridge_core::TransportError;
use voicebridge_core::transport::{InboundFrame, TransportSink, TransportSource};
use voicebridge_core::wire;

/// Reading half of a call's socket. Generic over the message stream so the
/// frame mapping works on any source of axum messages.
pub struct SocketSource<S = SplitStream<WebSocket>> {
    rx: S,
    open: Arc<AtomicBool>,
}

pub struct SocketSink {
    tx: SplitSink<WebSocket, Message>,
    open: Arc<AtomicBool>,
}

/// Splits the socket into halves that share one open flag.
pub fn split(socket: WebSocket) -> (SocketSource, SocketSink) {
    let (tx, rx) = socket.split();
    let open = Arc::new(AtomicBool::new(true));
    (SocketSource::new(rx, open.clone()), SocketSink { tx, open })
}

impl<S> SocketSource<S> {
    pub fn new(rx: S, open: Arc<AtomicBool>) -> Self {
        Self { rx, open }
    }
}

#[async_trait]
impl<S> TransportSource for SocketSource<S>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        loop {
            let Some(message) = self.rx.next().await else {
                self.open.store(false, Ordering::SeqCst);
                return Ok(None);
            };
            match message.map_err(|e| TransportError::Receive(e.to_string()))? {
                Message::Text(text) => match wire::decode_inbound(text.as_str()) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => warn!(error = %e, "Dropping malformed media frame"),
                },
                Message::Binary(pcm) => return Ok(Some(InboundFrame::Audio(pcm))),
                Message::Close(frame) => {
                    debug!(?frame, "Caller sent close frame");
                    self.open.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) => trace!("Keepalive"),
            }
        }
    }
}

#[async_trait]
impl TransportSink for SocketSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&mut self, message: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.tx
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Err(e) = self.tx.close().await {
            debug!(error = %e, "WebSocket already closed");
        }
    }
}
