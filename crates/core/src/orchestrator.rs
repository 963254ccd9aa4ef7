//! One live call: the transport, the realtime session, and the loops between them.
//!
//! A [`CallSession`] is established (bootstrap, then `Active`) and then driven
//! by [`CallSession::run`], which supervises three tasks:
//!
//! - the inbound pump, moving caller audio into the session;
//! - the update dispatch, reacting to session updates in arrival order;
//! - the outbound forwarder, writing queued frames to the transport.
//!
//! The transport-facing tasks share one cancellation scope and the session
//! facing task another. Any task that stops for any reason closes the call,
//! which cancels both scopes; `run` then joins all three and disposes the
//! session exactly once.

use crate::error::{BridgeError, SessionError, ToolError};
use crate::forwarder::{OutboundQueue, QueueStats, outbound_channel};
use crate::profile::{Agent, AgentProfile};
use crate::registry::ToolRegistry;
use crate::session::{
    self, ConnectionSettings, ConversationSession, FunctionCallOutput, SessionConnector,
    UpdateStream,
};
use crate::tool;
use crate::transport::{InboundFrame, TransportSink, TransportSource};
use crate::update::{CreatedItem, FunctionCall, Update};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, trace, warn};
use uuid::Uuid;

/// Longest a single tool call may run before it is reported as failed.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Initializing,
    Active,
    Closing,
    Closed,
}

pub struct CallSession {
    id: Uuid,
    agent: Agent,
    session: Arc<dyn ConversationSession>,
    state: watch::Sender<CallState>,
    transport_scope: CancellationToken,
    session_scope: CancellationToken,
    outbound: OnceLock<OutboundQueue>,
    closing: AtomicBool,
    disposed: AtomicBool,
}

impl CallSession {
    /// Connects and configures the realtime session for `agent`, returning an
    /// active call. Configuration errors surface here, before any loop runs.
    #[instrument(skip_all, fields(profile = %agent.profile.name))]
    pub async fn establish(
        agent: &Agent,
        settings: &ConnectionSettings,
        connector: &dyn SessionConnector,
    ) -> Result<Arc<Self>, BridgeError> {
        let session = session::bootstrap(settings, &agent.profile, &agent.tools, connector).await?;
        let call = Self::new(agent.clone(), session);
        call.state.send_replace(CallState::Active);
        info!(call_id = %call.id, "Call is active");
        Ok(Arc::new(call))
    }

    fn new(agent: Agent, session: Arc<dyn ConversationSession>) -> Self {
        let (state, _) = watch::channel(CallState::Initializing);
        Self {
            id: Uuid::new_v4(),
            agent,
            session,
            state,
            transport_scope: CancellationToken::new(),
            session_scope: CancellationToken::new(),
            outbound: OnceLock::new(),
            closing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.agent.profile
    }

    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    /// Outbound queue depth, once the call is running.
    pub fn outbound_stats(&self) -> Option<QueueStats> {
        self.outbound.get().map(OutboundQueue::stats)
    }

    /// Runs the call until the transport closes, the session ends, or
    /// [`close`](Self::close) is called. Returns once every loop has stopped
    /// and the session has been released.
    pub async fn run<R, W>(self: Arc<Self>, source: R, sink: W) -> Result<(), BridgeError>
    where
        R: TransportSource + 'static,
        W: TransportSink + 'static,
    {
        match self.state() {
            CallState::Active => {}
            CallState::Closing => {
                debug!("Call closed before it started running");
                let mut sink = sink;
                sink.close().await;
                self.dispose().await;
                return Ok(());
            }
            state => return Err(BridgeError::NotActive(state)),
        }
        let updates = match self.session.updates() {
            Ok(updates) => updates,
            Err(e) => {
                self.dispose().await;
                return Err(e.into());
            }
        };

        let (queue, forwarder) = outbound_channel();
        let _ = self.outbound.set(queue.clone());

        let mut loops = JoinSet::new();
        loops.spawn(
            self.clone()
                .pump_inbound(source)
                .instrument(info_span!("inbound_pump")),
        );
        loops.spawn(
            self.clone()
                .dispatch_updates(updates, queue)
                .instrument(info_span!("update_dispatch")),
        );
        let call = self.clone();
        let scope = self.transport_scope.clone();
        loops.spawn(
            async move {
                forwarder.run(sink, scope).await;
                call.close();
            }
            .instrument(info_span!("outbound_forwarder")),
        );

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Call loop terminated abnormally");
                self.close();
            }
        }
        self.dispose().await;
        Ok(())
    }

    /// Requests teardown. Cancels both scopes the first time; later calls are no-ops.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(call_id = %self.id, "Closing call");
        self.state.send_if_modified(|state| {
            if *state == CallState::Closed {
                return false;
            }
            *state = CallState::Closing;
            true
        });
        self.transport_scope.cancel();
        self.session_scope.cancel();
    }

    /// Resolves once the call has fully shut down.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == CallState::Closed).await;
    }

    async fn dispose(&self) {
        self.close();
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session.close().await;
        self.state.send_replace(CallState::Closed);
        info!(call_id = %self.id, "Call closed");
    }

    async fn pump_inbound<R: TransportSource>(self: Arc<Self>, mut source: R) {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.transport_scope.cancelled() => {
                    debug!("Inbound pump cancelled");
                    break;
                }
                received = source.receive() => received,
            };
            match received {
                Ok(Some(InboundFrame::Audio(pcm))) => {
                    trace!(bytes = pcm.len(), "Forwarding caller audio");
                    let sent = tokio::select! {
                        biased;
                        _ = self.session_scope.cancelled() => {
                            debug!("Inbound pump cancelled while sending audio");
                            break;
                        }
                        sent = self.session.send_audio(pcm) => sent,
                    };
                    if let Err(e) = sent {
                        error!(error = %e, "Failed to forward caller audio");
                        break;
                    }
                }
                Ok(Some(InboundFrame::Control(kind))) => trace!(%kind, "Ignoring non-audio frame"),
                Ok(None) => {
                    info!("Caller hung up");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Transport receive failed");
                    break;
                }
            }
        }
        self.close();
    }

    async fn dispatch_updates(self: Arc<Self>, mut updates: UpdateStream, queue: OutboundQueue) {
        let dispatcher = Dispatcher::new(self.session.clone(), self.agent.tools.clone(), queue);
        let speaks_first = self.agent.profile.speaks_first;
        let outcome = tokio::select! {
            biased;
            _ = self.session_scope.cancelled() => {
                debug!("Update dispatch cancelled");
                Ok(())
            }
            outcome = dispatcher.drive(&mut updates, speaks_first) => outcome,
        };
        if let Err(e) = outcome {
            error!(error = %e, "Update dispatch stopped");
        }
        self.close();
    }
}

/// Reacts to session updates. Each variant maps to exactly one reaction.
pub(crate) struct Dispatcher {
    session: Arc<dyn ConversationSession>,
    tools: Arc<ToolRegistry>,
    outbound: OutboundQueue,
    tool_timeout: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        session: Arc<dyn ConversationSession>,
        tools: Arc<ToolRegistry>,
        outbound: OutboundQueue,
    ) -> Self {
        Self {
            session,
            tools,
            outbound,
            tool_timeout: TOOL_TIMEOUT,
        }
    }

    pub(crate) fn with_tool_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }

    /// Consumes the stream one update at a time until it ends or fails.
    async fn drive(&self, updates: &mut UpdateStream, speaks_first: bool) -> Result<(), SessionError> {
        if speaks_first {
            self.session.start_response_turn().await?;
        }
        while let Some(update) = updates.next().await {
            self.handle(update?).await?;
        }
        info!("Realtime update stream ended");
        Ok(())
    }

    pub(crate) async fn handle(&self, update: Update) -> Result<(), SessionError> {
        trace!(kind = update.kind(), "Session update");
        match update {
            Update::SpeechStarted => {
                debug!("Caller started speaking; stopping playback");
                if !self.outbound.interrupt() {
                    debug!("Outbound forwarder has stopped; stop-audio not queued");
                }
            }
            Update::AudioDelta(pcm) => {
                trace!(bytes = pcm.len(), "Queueing model audio");
                if !self.outbound.enqueue_audio(pcm) {
                    debug!("Outbound forwarder has stopped; audio not queued");
                }
            }
            Update::ItemFinished {
                function_call: Some(call),
                ..
            } => self.run_tool_call(call).await?,
            Update::ItemFinished { item_id, .. } => debug!(?item_id, "Item finished"),
            Update::TurnFinished { created_items } => {
                if created_items.iter().any(CreatedItem::is_function_call) {
                    debug!("Turn produced tool calls; resuming with their outputs");
                    self.session.start_response_turn().await?;
                }
            }
            Update::Error(message) => return Err(SessionError::Stream(message)),
            Update::SessionStarted { session_id } => info!(?session_id, "Realtime session started"),
            Update::InputTranscribed(transcript) => info!(%transcript, "Caller transcript"),
            Update::SpeechEnded => debug!("Caller stopped speaking"),
            Update::ItemStarted => trace!("Response item started"),
            Update::Other => {}
        }
        Ok(())
    }

    #[instrument(skip_all, fields(tool = %call.name, function_call_id = %call.call_id))]
    async fn run_tool_call(&self, call: FunctionCall) -> Result<(), SessionError> {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("No tool registered under this name; dropping call");
            return Ok(());
        };
        debug!(arguments = %call.arguments, "Executing tool call");
        let executed = tokio::time::timeout(self.tool_timeout, tool.execute(&call.arguments))
            .await
            .unwrap_or_else(|_| {
                Err(ToolError::Failed(format!(
                    "timed out after {}s",
                    self.tool_timeout.as_secs_f32()
                )))
            });
        let output = match executed {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Tool failed; reporting the error to the model");
                tool::error_output(&e)
            }
        };
        debug!(%output, "Tool call finished");
        self.session
            .add_item(FunctionCallOutput {
                call_id: call.call_id,
                output,
            })
            .await
    }
}
