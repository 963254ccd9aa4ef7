//! In-memory stand-ins for the session client and the transport.

use crate::error::{SessionError, TransportError};
use crate::session::{
    Connection, ConversationSession, FunctionCallOutput, SessionConnector, SessionOptions,
    UpdateStream,
};
use crate::transport::{InboundFrame, TransportSink, TransportSource};
use crate::update::Update;
use crate::wire::OutboundFrame;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Polls `condition` until it holds, failing the test after two seconds.
pub(crate) async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Everything the orchestrator asked the session to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionCall {
    Audio(Bytes),
    AddItem(FunctionCallOutput),
    StartResponse,
}

type UpdateResult = Result<Update, SessionError>;

struct FakeSessionInner {
    configured: Mutex<Vec<SessionOptions>>,
    calls: Mutex<Vec<SessionCall>>,
    closes: AtomicUsize,
    updates_tx: Mutex<Option<mpsc::UnboundedSender<UpdateResult>>>,
    updates_rx: Mutex<Option<mpsc::UnboundedReceiver<UpdateResult>>>,
    fail_configure: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct FakeSession {
    inner: Arc<FakeSessionInner>,
}

impl FakeSession {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(FakeSessionInner {
                configured: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                closes: AtomicUsize::new(0),
                updates_tx: Mutex::new(Some(tx)),
                updates_rx: Mutex::new(Some(rx)),
                fail_configure: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn shared(&self) -> Arc<dyn ConversationSession> {
        Arc::new(self.clone())
    }

    pub(crate) fn fail_configure(&self) {
        self.inner.fail_configure.store(true, Ordering::SeqCst);
    }

    pub(crate) fn push(&self, update: Update) {
        self.push_result(Ok(update));
    }

    pub(crate) fn push_result(&self, update: UpdateResult) {
        if let Some(tx) = self.inner.updates_tx.lock().unwrap().as_ref() {
            let _ = tx.send(update);
        }
    }

    /// Ends the update stream as if the remote side hung up.
    pub(crate) fn end_stream(&self) {
        self.inner.updates_tx.lock().unwrap().take();
    }

    pub(crate) fn configured(&self) -> Vec<SessionOptions> {
        self.inner.configured.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> Vec<SessionCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub(crate) fn audio(&self) -> Vec<Bytes> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SessionCall::Audio(pcm) => Some(pcm),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn items(&self) -> Vec<FunctionCallOutput> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SessionCall::AddItem(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn response_turns(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SessionCall::StartResponse))
            .count()
    }

    pub(crate) fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    fn record(&self, call: SessionCall) {
        self.inner.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ConversationSession for FakeSession {
    async fn configure(&self, options: &SessionOptions) -> Result<(), SessionError> {
        if self.inner.fail_configure.load(Ordering::SeqCst) {
            return Err(SessionError::Send("configure rejected".into()));
        }
        self.inner.configured.lock().unwrap().push(options.clone());
        Ok(())
    }

    async fn send_audio(&self, pcm: Bytes) -> Result<(), SessionError> {
        self.record(SessionCall::Audio(pcm));
        Ok(())
    }

    async fn add_item(&self, output: FunctionCallOutput) -> Result<(), SessionError> {
        self.record(SessionCall::AddItem(output));
        Ok(())
    }

    async fn start_response_turn(&self) -> Result<(), SessionError> {
        self.record(SessionCall::StartResponse);
        Ok(())
    }

    fn updates(&self) -> Result<UpdateStream, SessionError> {
        let rx = self
            .inner
            .updates_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(SessionError::AlreadyConsumed)?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn close(&self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeConnector {
    session: FakeSession,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn new(session: FakeSession) -> Self {
        Self {
            session,
            connects: AtomicUsize::new(0),
        }
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(
        &self,
        _connection: &Connection,
    ) -> Result<Arc<dyn ConversationSession>, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.session.shared())
    }
}

type FrameResult = Result<Option<InboundFrame>, TransportError>;

/// The caller's side of a fake transport.
pub(crate) struct FakePeer {
    inbound: Option<mpsc::UnboundedSender<FrameResult>>,
    written: Arc<Mutex<Vec<String>>>,
    open: Arc<AtomicBool>,
    failing_writes: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
    sink_closes: Arc<AtomicUsize>,
}

pub(crate) struct FakeSource {
    rx: mpsc::UnboundedReceiver<FrameResult>,
}

pub(crate) struct FakeSink {
    written: Arc<Mutex<Vec<String>>>,
    open: Arc<AtomicBool>,
    failing_writes: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
    closes: Arc<AtomicUsize>,
}

/// Builds a connected fake transport whose writes flow freely.
pub(crate) fn fake_transport() -> (FakePeer, FakeSource, FakeSink) {
    let (tx, rx) = mpsc::unbounded_channel();
    let written = Arc::new(Mutex::new(Vec::new()));
    let open = Arc::new(AtomicBool::new(true));
    let failing_writes = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(Semaphore::MAX_PERMITS));
    let closes = Arc::new(AtomicUsize::new(0));
    (
        FakePeer {
            inbound: Some(tx),
            written: written.clone(),
            open: open.clone(),
            failing_writes: failing_writes.clone(),
            gate: gate.clone(),
            sink_closes: closes.clone(),
        },
        FakeSource { rx },
        FakeSink {
            written,
            open,
            failing_writes,
            gate,
            closes,
        },
    )
}

/// Builds a fake transport whose writes block until [`FakePeer::allow_writes`].
pub(crate) fn gated_transport() -> (FakePeer, FakeSource, FakeSink) {
    let (mut peer, source, mut sink) = fake_transport();
    let gate = Arc::new(Semaphore::new(0));
    peer.gate = gate.clone();
    sink.gate = gate;
    (peer, source, sink)
}

impl FakePeer {
    pub(crate) fn send_audio(&self, pcm: &'static [u8]) {
        self.send(Ok(Some(InboundFrame::Audio(Bytes::from_static(pcm)))));
    }

    pub(crate) fn send(&self, frame: FrameResult) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(frame);
        }
    }

    /// Hangs up: the source reports closed and the sink stops accepting writes.
    pub(crate) fn hang_up(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.inbound.take();
        self.gate.close();
    }

    pub(crate) fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub(crate) fn allow_writes(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub(crate) fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }

    pub(crate) fn written_frames(&self) -> Vec<OutboundFrame> {
        self.written().iter().map(|text| decode_outbound(text)).collect()
    }

    pub(crate) fn sink_closes(&self) -> usize {
        self.sink_closes.load(Ordering::SeqCst)
    }
}

fn decode_outbound(text: &str) -> OutboundFrame {
    use base64::Engine;
    let value: serde_json::Value = serde_json::from_str(text).unwrap();
    match value["kind"].as_str() {
        Some("StopAudio") => OutboundFrame::StopAudio,
        Some("AudioData") => {
            let data = value["audioData"]["data"].as_str().unwrap();
            let pcm = base64::engine::general_purpose::STANDARD
                .decode(data)
                .unwrap();
            OutboundFrame::Audio(Bytes::from(pcm))
        }
        other => panic!("unexpected outbound kind {other:?}"),
    }
}

#[async_trait]
impl TransportSource for FakeSource {
    async fn receive(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        match self.rx.recv().await {
            Some(frame) => frame,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TransportSink for FakeSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&mut self, message: String) -> Result<(), TransportError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| TransportError::Closed)?;
        permit.forget();
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let failing = self.failing_writes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_writes.store(failing - 1, Ordering::SeqCst);
            return Err(TransportError::Send("simulated write failure".into()));
        }
        self.written.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
