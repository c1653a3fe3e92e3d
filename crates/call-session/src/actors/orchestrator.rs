//! `CallOrchestrator` - single source of truth for the local user's call.
//!
//! The actor reconciles three inputs:
//! - commands from UI handles (initiate, accept, reject, end, toggles)
//! - inbound signaling events from its [`Subscription`]
//! - engine room events routed through the [`MediaTransportBinding`]
//!
//! Each input becomes a [`CallInput`] for [`CallPhase::apply`]; the returned
//! effects (emit, join, leave) are executed in order and the resulting
//! [`CallSnapshot`] is published on a watch channel.
//!
//! # Implicit End of Call
//!
//! While connected, the call is torn down locally without waiting for
//! CALL_ENDED when either signaling reports zero active participants or the
//! engine reports the last remote participant leaving.

use super::messages::{CallRequest, CallSnapshot, OrchestratorMessage};
use super::metrics::MailboxMonitor;
use crate::config::Config;
use crate::errors::CallError;
use crate::machine::{CallEffect, CallInput, CallPhase, InvalidTransition};
use crate::models::{CallInfo, CallKind, IncomingCallInfo, RoomCredential, UserIdentity};
use crate::observability::metrics;
use crate::signaling::{InboundEvent, SignalingChannel, Subscription};
use crate::transport::{EngineEvent, EngineEventOutcome, MediaEngine, MediaTransportBinding};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// External collaborators of the orchestrator.
pub struct OrchestratorDeps {
    /// Shared, already authenticated signaling channel.
    pub signaling: Arc<dyn SignalingChannel>,
    /// Real-time media engine.
    pub engine: Arc<dyn MediaEngine>,
    /// The logged-in user.
    pub local_user: UserIdentity,
}

/// Handle to a `CallOrchestrator`.
#[derive(Clone)]
pub struct CallOrchestratorHandle {
    sender: mpsc::Sender<OrchestratorMessage>,
    cancel_token: CancellationToken,
    snapshot_rx: watch::Receiver<CallSnapshot>,
    mailbox: Arc<MailboxMonitor>,
}

impl CallOrchestratorHandle {
    /// Start an outgoing call to `receiver_id`.
    ///
    /// # Errors
    ///
    /// - [`CallError::SignalingUnavailable`] when the channel is not connected
    /// - [`CallError::CallInProgress`] when a call or incoming call is held
    pub async fn initiate_call(
        &self,
        receiver_id: impl Into<String>,
        call_kind: CallKind,
        chat_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<(), CallError> {
        let request = CallRequest {
            receiver_id: receiver_id.into(),
            receiver_name: String::new(),
            call_kind,
            chat_id,
            session_id,
        };
        self.request(|respond_to| OrchestratorMessage::InitiateCall {
            request,
            respond_to,
        })
        .await
    }

    /// Start a video call for a tutoring session, showing `other_user_name`
    /// while the call is being set up.
    ///
    /// # Errors
    ///
    /// Same as [`initiate_call`](Self::initiate_call).
    pub async fn join_session_call(
        &self,
        session_id: impl Into<String>,
        other_user_id: impl Into<String>,
        other_user_name: impl Into<String>,
    ) -> Result<(), CallError> {
        let request = CallRequest {
            receiver_id: other_user_id.into(),
            receiver_name: other_user_name.into(),
            call_kind: CallKind::Video,
            chat_id: None,
            session_id: Some(session_id.into()),
        };
        self.request(|respond_to| OrchestratorMessage::InitiateCall {
            request,
            respond_to,
        })
        .await
    }

    /// Accept the ringing call. The room is joined once signaling sends the
    /// credential.
    ///
    /// # Errors
    ///
    /// [`CallError::InvalidTransition`] when no call is ringing.
    pub async fn accept_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| OrchestratorMessage::AcceptCall { respond_to })
            .await
    }

    /// Decline the ringing call.
    ///
    /// # Errors
    ///
    /// [`CallError::InvalidTransition`] when no call is ringing.
    pub async fn reject_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| OrchestratorMessage::RejectCall { respond_to })
            .await
    }

    /// End the current call.
    ///
    /// # Errors
    ///
    /// [`CallError::InvalidTransition`] when no call is held.
    pub async fn end_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| OrchestratorMessage::EndCall { respond_to })
            .await
    }

    /// Flip the local microphone. No-op without an active call.
    pub async fn toggle_audio(&self) -> Result<(), CallError> {
        self.request(|respond_to| OrchestratorMessage::ToggleAudio { respond_to })
            .await
    }

    /// Flip the local camera. No-op without an active call.
    pub async fn toggle_video(&self) -> Result<(), CallError> {
        self.request(|respond_to| OrchestratorMessage::ToggleVideo { respond_to })
            .await
    }

    /// Snapshot taken after every command sent before this one is applied.
    pub async fn get_snapshot(&self) -> Result<CallSnapshot, CallError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        self.sender
            .send(OrchestratorMessage::GetSnapshot { respond_to: tx })
            .await
            .map_err(|e| CallError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| CallError::Internal(format!("response receive failed: {e}")))
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CallSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Cancel the actor. Teardown (unsubscribe, transport leave) runs on the
    /// actor task.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Commands sent but not yet fully handled by the actor.
    #[must_use]
    pub fn mailbox_depth(&self) -> usize {
        self.mailbox.current_depth()
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), CallError>>) -> OrchestratorMessage,
    ) -> Result<(), CallError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| CallError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| CallError::Internal(format!("response receive failed: {e}")))?
    }
}

/// The `CallOrchestrator` implementation.
pub struct CallOrchestrator {
    /// Command receiver.
    receiver: mpsc::Receiver<OrchestratorMessage>,
    cancel_token: CancellationToken,
    signaling: Arc<dyn SignalingChannel>,
    local_user: UserIdentity,
    /// Registration of `signaling_rx` on the channel.
    subscription: Subscription,
    signaling_rx: mpsc::Receiver<InboundEvent>,
    engine_rx: mpsc::Receiver<EngineEvent>,
    binding: MediaTransportBinding,
    phase: CallPhase,
    pending_call_timeout: Option<Duration>,
    /// Deadline of the current pending phase, if a timeout is configured.
    pending_deadline: Option<Instant>,
    connected_at: Option<chrono::DateTime<Utc>>,
    snapshot_tx: watch::Sender<CallSnapshot>,
    mailbox: Arc<MailboxMonitor>,
}

impl CallOrchestrator {
    /// Spawn the orchestrator.
    ///
    /// The signaling subscription is registered before this returns, so
    /// events emitted right after `spawn` are not lost.
    pub fn spawn(
        deps: OrchestratorDeps,
        config: &Config,
        cancel_token: CancellationToken,
    ) -> (CallOrchestratorHandle, JoinHandle<()>) {
        // Hand-built configs skip from_vars validation; tokio channels need
        // at least one slot
        let mailbox_capacity = config.mailbox_capacity.max(1);
        let event_buffer = config.event_buffer.max(1);

        let (sender, receiver) = mpsc::channel(mailbox_capacity);
        let (signaling_tx, signaling_rx) = mpsc::channel(event_buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(CallSnapshot::default());

        let subscription = Subscription::register(Arc::clone(&deps.signaling), signaling_tx);
        let binding = MediaTransportBinding::new(deps.engine, config.transport_app_id.clone())
            .with_join_timeout(config.join_timeout);
        let engine_rx = binding.attach_events(event_buffer);
        let mailbox = Arc::new(MailboxMonitor::new(mailbox_capacity));

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            signaling: deps.signaling,
            local_user: deps.local_user,
            subscription,
            signaling_rx,
            engine_rx,
            binding,
            phase: CallPhase::Idle,
            pending_call_timeout: config.pending_call_timeout,
            pending_deadline: None,
            connected_at: None,
            snapshot_tx,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = CallOrchestratorHandle {
            sender,
            cancel_token,
            snapshot_rx,
            mailbox,
        };

        (handle, task_handle)
    }

    /// Run the actor loop.
    #[instrument(skip_all, name = "call.actor.orchestrator", fields(user_id = %self.local_user.id))]
    async fn run(mut self) {
        info!(
            target: "call.actor.orchestrator",
            subscription_id = %self.subscription.id(),
            "CallOrchestrator started"
        );

        loop {
            let pending_deadline = self.pending_deadline;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "call.actor.orchestrator",
                        "CallOrchestrator received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                        }
                        None => {
                            info!(
                                target: "call.actor.orchestrator",
                                "CallOrchestrator channel closed, exiting"
                            );
                            break;
                        }
                    }
                }

                Some(event) = self.signaling_rx.recv() => {
                    self.handle_signaling_event(event).await;
                }

                Some(event) = self.engine_rx.recv() => {
                    self.handle_engine_event(event).await;
                }

                () = tokio::time::sleep_until(pending_deadline.unwrap_or_else(Instant::now)),
                    if pending_deadline.is_some() =>
                {
                    info!(
                        target: "call.actor.orchestrator",
                        phase = self.phase.name(),
                        "Pending call timed out"
                    );
                    let _ = self.drive(CallInput::PendingTimedOut).await;
                }
            }
        }

        self.shutdown().await;

        info!(
            target: "call.actor.orchestrator",
            messages_processed = self.mailbox.messages_processed(),
            "CallOrchestrator stopped"
        );
    }

    async fn handle_message(&mut self, message: OrchestratorMessage) {
        match message {
            OrchestratorMessage::InitiateCall {
                request,
                respond_to,
            } => {
                let result = self.handle_initiate(request).await;
                let _ = respond_to.send(result);
            }

            OrchestratorMessage::AcceptCall { respond_to } => {
                let result = self.drive_command(CallInput::AcceptRequested).await;
                let _ = respond_to.send(result);
            }

            OrchestratorMessage::RejectCall { respond_to } => {
                let result = self.drive_command(CallInput::RejectRequested).await;
                let _ = respond_to.send(result);
            }

            OrchestratorMessage::EndCall { respond_to } => {
                let result = self.drive_command(CallInput::EndRequested).await;
                let _ = respond_to.send(result);
            }

            OrchestratorMessage::ToggleAudio { respond_to } => {
                self.binding.toggle_audio().await;
                self.publish();
                let _ = respond_to.send(Ok(()));
            }

            OrchestratorMessage::ToggleVideo { respond_to } => {
                self.binding.toggle_video().await;
                self.publish();
                let _ = respond_to.send(Ok(()));
            }

            OrchestratorMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.build_snapshot());
            }
        }
    }

    async fn handle_initiate(&mut self, request: CallRequest) -> Result<(), CallError> {
        if !self.signaling.is_connected() {
            warn!(
                target: "call.actor.orchestrator",
                receiver_id = %request.receiver_id,
                "Cannot initiate call, signaling channel not connected"
            );
            return Err(CallError::SignalingUnavailable);
        }

        if self.phase.is_busy() {
            warn!(
                target: "call.actor.orchestrator",
                phase = self.phase.name(),
                "Cannot initiate call, another call is in progress"
            );
            return Err(CallError::CallInProgress);
        }

        if request.receiver_id == self.local_user.id {
            return Err(CallError::InvalidTransition(
                "cannot call yourself".to_string(),
            ));
        }

        let call = CallInfo {
            session_id: request.session_id,
            chat_id: request.chat_id,
            ..CallInfo::placeholder(
                UserIdentity::new(request.receiver_id, request.receiver_name),
                request.call_kind,
            )
        };

        info!(
            target: "call.actor.orchestrator",
            receiver_id = %call.other_user.id,
            call_kind = %call.call_kind,
            "Initiating call"
        );

        self.drive_command(CallInput::InitiateRequested(call)).await
    }

    async fn drive_command(&mut self, input: CallInput) -> Result<(), CallError> {
        self.drive(input)
            .await
            .map_err(|e| CallError::InvalidTransition(e.to_string()))
    }

    async fn handle_signaling_event(&mut self, event: InboundEvent) {
        metrics::record_signaling_event(event.name());
        debug!(
            target: "call.signaling",
            event = event.name(),
            call_id = event.call_id().unwrap_or_default(),
            "Signaling event received"
        );

        let input = match event {
            InboundEvent::CallInitiated {
                call_id,
                channel_name,
                token,
                uid,
                ..
            } => CallInput::CallInitiated {
                call_id,
                credential: RoomCredential {
                    channel_name,
                    token,
                    uid,
                },
            },

            InboundEvent::IncomingCall {
                call_id,
                channel_name,
                call_type,
                caller,
                session_id,
            } => {
                let mut incoming = IncomingCallInfo::new(call_id, channel_name, call_type, caller);
                incoming.call.session_id = session_id;
                CallInput::IncomingSignaled(incoming)
            }

            InboundEvent::CallAccepted {
                call_id,
                channel_name,
                token,
                uid,
            } => CallInput::CallAccepted {
                call_id,
                credential: RoomCredential {
                    channel_name,
                    token,
                    uid,
                },
            },

            InboundEvent::CallRejected { call_id }
            | InboundEvent::CallEnded { call_id, .. }
            | InboundEvent::CallCancelled { call_id } => CallInput::Terminal { call_id },

            InboundEvent::CallParticipantLeft {
                call_id,
                user_id,
                active_participants,
            } => {
                let drained = active_participants == 0
                    && matches!(&self.phase, CallPhase::Connected { call } if call.matches(&call_id));
                if !drained {
                    debug!(
                        target: "call.signaling",
                        call_id = %call_id,
                        user_id = %user_id,
                        active_participants,
                        "Participant left"
                    );
                    return;
                }
                info!(
                    target: "call.actor.orchestrator",
                    call_id = %call_id,
                    "No participants left, ending call locally"
                );
                CallInput::RemoteDrained
            }

            InboundEvent::CallAcceptedByReceiver { call_id } => {
                info!(target: "call.signaling", call_id = %call_id, "Call accepted by receiver");
                return;
            }

            InboundEvent::CallParticipantJoined {
                call_id,
                user_id,
                active_participants,
                ..
            } => {
                info!(
                    target: "call.signaling",
                    call_id = %call_id,
                    user_id = %user_id,
                    active_participants,
                    "Participant joined"
                );
                return;
            }

            InboundEvent::CallBothConnected { call_id, message } => {
                info!(target: "call.signaling", call_id = %call_id, message = %message, "Both parties connected");
                return;
            }

            InboundEvent::CallError { message } => {
                warn!(target: "call.signaling", message = %message, "Signaling reported a call error");
                return;
            }
        };

        let _ = self.drive(input).await;
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        match self.binding.handle_engine_event(event).await {
            EngineEventOutcome::Unchanged => {}
            EngineEventOutcome::RemoteUsersChanged => self.publish(),
            EngineEventOutcome::RemoteUsersDrained => {
                if matches!(self.phase, CallPhase::Connected { .. }) {
                    info!(
                        target: "call.actor.orchestrator",
                        "Last remote participant left the room, ending call locally"
                    );
                    let _ = self.drive(CallInput::RemoteDrained).await;
                } else {
                    self.publish();
                }
            }
            EngineEventOutcome::ConnectionLost => {
                let _ = self.drive(CallInput::TransportLost).await;
            }
        }
    }

    /// Apply `input` and any follow-up inputs produced by its effects, then
    /// publish the snapshot once.
    ///
    /// Only the first input's validity is reported; follow-ups (join results)
    /// are always valid for the phase that requested the join.
    async fn drive(&mut self, input: CallInput) -> Result<(), InvalidTransition> {
        let mut result = Ok(());
        let mut next = Some(input);
        let mut first = true;

        while let Some(input) = next.take() {
            match self.step(input).await {
                Ok(follow_up) => next = follow_up,
                Err(e) if first => result = Err(e),
                Err(_) => {}
            }
            first = false;
        }

        self.publish();
        result
    }

    async fn step(&mut self, input: CallInput) -> Result<Option<CallInput>, InvalidTransition> {
        let input_name = input.name();
        let reason = end_reason(&input);

        let transition = match self.phase.apply(input) {
            Ok(transition) => transition,
            Err(e) => {
                debug!(
                    target: "call.actor.orchestrator",
                    phase = e.phase,
                    input = e.input,
                    "Ignoring invalid transition"
                );
                metrics::record_invalid_transition(e.input);
                return Err(e);
            }
        };

        let previous = std::mem::replace(&mut self.phase, transition.next);
        debug!(
            target: "call.actor.orchestrator",
            input = input_name,
            from = previous.name(),
            to = self.phase.name(),
            "Call phase transition"
        );

        if self.phase.name() != previous.name() {
            self.on_phase_changed(&previous, reason);
        }

        let mut follow_up = None;
        for effect in transition.effects {
            if let Some(input) = self.execute(effect).await {
                follow_up = Some(input);
            }
        }
        Ok(follow_up)
    }

    fn on_phase_changed(&mut self, previous: &CallPhase, end_reason: &'static str) {
        self.pending_deadline = match self.pending_call_timeout {
            Some(timeout) if self.phase.is_pending() => Some(Instant::now() + timeout),
            _ => None,
        };

        match self.phase {
            CallPhase::Connected { .. } => self.connected_at = Some(Utc::now()),
            CallPhase::Idle => {
                self.connected_at = None;
                if previous.is_busy() {
                    metrics::record_session_ended(end_reason);
                }
            }
            _ => {}
        }
    }

    async fn execute(&mut self, effect: CallEffect) -> Option<CallInput> {
        match effect {
            CallEffect::Emit(event) => {
                let name = event.name();
                match self.signaling.emit(event) {
                    Ok(()) => debug!(target: "call.signaling", event = name, "Signaling event emitted"),
                    Err(e) => warn!(
                        target: "call.signaling",
                        event = name,
                        error = %e,
                        "Failed to emit signaling event"
                    ),
                }
                None
            }

            CallEffect::JoinRoom(credential) => {
                // Surface the connecting phase before the join is awaited
                self.publish();
                match self
                    .binding
                    .join(&credential.channel_name, &credential.token, credential.uid)
                    .await
                {
                    Ok(()) => Some(CallInput::TransportConnected {
                        media_uid: credential.uid,
                    }),
                    Err(e) => {
                        warn!(
                            target: "call.actor.orchestrator",
                            channel = %credential.channel_name,
                            error = %e,
                            "Transport join failed"
                        );
                        Some(CallInput::TransportFailed)
                    }
                }
            }

            CallEffect::LeaveRoom => {
                self.binding.leave().await;
                None
            }
        }
    }

    fn build_snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            call_state: self.binding.state(),
            current_call: self.phase.current_call().cloned(),
            incoming_call: self.phase.incoming_call().cloned(),
            is_audio_muted: self.binding.is_audio_muted(),
            is_video_muted: self.binding.is_video_muted(),
            has_local_audio: self.binding.has_local_audio(),
            has_local_video: self.binding.has_local_video(),
            remote_users: self.binding.remote_users(),
            error: self.binding.error().map(str::to_string),
            connected_at: self.connected_at,
        }
    }

    fn publish(&self) {
        let next = self.build_snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Unregister from signaling and release the transport.
    async fn shutdown(&mut self) {
        self.subscription.dispose();
        self.binding.detach_events();
        self.binding.leave().await;

        if self.phase.is_busy() {
            metrics::record_session_ended("shutdown");
        }
        self.phase = CallPhase::Idle;
        self.pending_deadline = None;
        self.connected_at = None;
        self.publish();
    }
}

/// Label for `call_sessions_ended_total` if `input` ends the call.
fn end_reason(input: &CallInput) -> &'static str {
    match input {
        CallInput::EndRequested => "local_end",
        CallInput::RejectRequested => "rejected",
        CallInput::Terminal { .. } => "remote_end",
        CallInput::RemoteDrained => "drained",
        CallInput::TransportFailed | CallInput::TransportLost => "transport_failure",
        CallInput::PendingTimedOut => "timeout",
        _ => "other",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_labels() {
        assert_eq!(end_reason(&CallInput::EndRequested), "local_end");
        assert_eq!(
            end_reason(&CallInput::Terminal {
                call_id: "c1".to_string()
            }),
            "remote_end"
        );
        assert_eq!(end_reason(&CallInput::RemoteDrained), "drained");
        assert_eq!(end_reason(&CallInput::TransportLost), "transport_failure");
        assert_eq!(end_reason(&CallInput::AcceptRequested), "other");
    }
}
