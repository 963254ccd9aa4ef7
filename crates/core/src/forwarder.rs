//! Ordered, single-consumer delivery of outbound frames to the transport.
//!
//! The queue is unbounded and strictly FIFO: the dispatch loop never waits on
//! a slow transport, nothing is dropped or reordered, and the forwarder drains
//! at whatever pace the transport accepts writes. Depth is exposed through
//! [`OutboundQueue::stats`] so a stalled transport can be spotted.

use crate::error::TransportError;
use crate::transport::TransportSink;
use crate::wire::OutboundFrame;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Queue depth at which the forwarder is considered to be falling behind.
pub const STALL_WARNING_DEPTH: usize = 256;

#[derive(Debug, Default)]
struct QueueShared {
    depth: AtomicUsize,
}

/// A point-in-time view of the outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Frames enqueued but not yet taken by the forwarder.
    pub depth: usize,
}

/// Producer half, held by the update dispatch loop.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    shared: Arc<QueueShared>,
}

/// Consumer half; the only reader of the queue.
#[derive(Debug)]
pub struct OutboundForwarder {
    rx: mpsc::UnboundedReceiver<OutboundFrame>,
    shared: Arc<QueueShared>,
}

pub fn outbound_channel() -> (OutboundQueue, OutboundForwarder) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(QueueShared::default());
    (
        OutboundQueue {
            tx,
            shared: shared.clone(),
        },
        OutboundForwarder { rx, shared },
    )
}

impl OutboundQueue {
    /// Queues model audio. Returns `false` once the forwarder has stopped.
    pub fn enqueue_audio(&self, pcm: Bytes) -> bool {
        self.push(OutboundFrame::Audio(pcm))
    }

    /// Queues a stop-audio frame behind everything already queued.
    pub fn interrupt(&self) -> bool {
        self.push(OutboundFrame::StopAudio)
    }

    pub fn stats(&self) -> QueueStats {
        stats(&self.shared)
    }

    fn push(&self, frame: OutboundFrame) -> bool {
        let depth = self.shared.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if depth == STALL_WARNING_DEPTH {
            warn!(depth, "Outbound queue is backing up; transport may be stalled");
        }
        if self.tx.send(frame).is_err() {
            self.shared.depth.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }
}

impl OutboundForwarder {
    pub fn stats(&self) -> QueueStats {
        stats(&self.shared)
    }

    /// Drains the queue into `sink` until cancelled, the queue closes, or the
    /// transport closes. A failed write is logged and skipped. The sink is
    /// closed on exit.
    pub async fn run<W: TransportSink>(mut self, mut sink: W, scope: CancellationToken) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    debug!("Outbound forwarder cancelled");
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(frame) => frame,
                    None => {
                        debug!("Outbound queue closed");
                        break;
                    }
                },
            };
            self.shared.depth.fetch_sub(1, Ordering::SeqCst);

            if !sink.is_open() {
                info!("Transport closed; stopping outbound forwarder");
                break;
            }

            let message = match frame.encode() {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Failed to encode outbound frame");
                    continue;
                }
            };

            let sent = tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    debug!("Outbound forwarder cancelled mid-write");
                    break;
                }
                sent = sink.send(message) => sent,
            };
            match sent {
                Ok(()) => trace!(frame = ?kind(&frame), "Frame written"),
                Err(TransportError::Closed) => {
                    info!("Transport closed; stopping outbound forwarder");
                    break;
                }
                Err(e) => warn!(error = %e, "Failed to write outbound frame; continuing"),
            }
        }
        sink.close().await;
    }
}

fn stats(shared: &QueueShared) -> QueueStats {
    QueueStats {
        depth: shared.depth.load(Ordering::SeqCst),
    }
}

fn kind(frame: &OutboundFrame) -> &'static str {
    match frame {
        OutboundFrame::Audio(_) => "audio",
        OutboundFrame::StopAudio => "stop_audio",
    }
}
