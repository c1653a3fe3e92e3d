//! Call phase state machine.
//!
//! [`CallPhase::apply`] is the only place call transitions are decided. It is
//! pure: side effects come back as [`CallEffect`]s which the orchestrator
//! actor executes in order. An input that is not valid for the current phase
//! yields [`InvalidTransition`] and the phase is left as it was.

use crate::models::{CallDirection, CallInfo, IncomingCallInfo, RoomCredential};
use crate::signaling::OutboundEvent;
use thiserror::Error;

/// Where the local user is in the call lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CallPhase {
    /// No call, no incoming offer.
    #[default]
    Idle,
    /// Waiting for signaling to hand out the room credential.
    AwaitingCredential {
        call: CallInfo,
        direction: CallDirection,
    },
    /// An offer is ringing and has not been answered.
    IncomingPending { incoming: IncomingCallInfo },
    /// Joining the transport room.
    Connecting { call: CallInfo },
    /// In the room with local tracks published.
    Connected { call: CallInfo },
}

/// Something that happened, from the user, signaling, the transport, or a
/// timer.
#[derive(Debug, Clone)]
pub enum CallInput {
    InitiateRequested(CallInfo),
    CallInitiated {
        call_id: String,
        credential: RoomCredential,
    },
    IncomingSignaled(IncomingCallInfo),
    AcceptRequested,
    RejectRequested,
    CallAccepted {
        call_id: String,
        credential: RoomCredential,
    },
    TransportConnected {
        media_uid: u32,
    },
    /// The room join failed.
    TransportFailed,
    /// The engine dropped an established or joining room connection.
    TransportLost,
    /// CALL_REJECTED, CALL_ENDED or CALL_CANCELLED.
    Terminal {
        call_id: String,
    },
    EndRequested,
    /// The last remote participant left the room.
    RemoteDrained,
    PendingTimedOut,
}

impl CallInput {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            CallInput::InitiateRequested(_) => "initiate_requested",
            CallInput::CallInitiated { .. } => "call_initiated",
            CallInput::IncomingSignaled(_) => "incoming_signaled",
            CallInput::AcceptRequested => "accept_requested",
            CallInput::RejectRequested => "reject_requested",
            CallInput::CallAccepted { .. } => "call_accepted",
            CallInput::TransportConnected { .. } => "transport_connected",
            CallInput::TransportFailed => "transport_failed",
            CallInput::TransportLost => "transport_lost",
            CallInput::Terminal { .. } => "terminal",
            CallInput::EndRequested => "end_requested",
            CallInput::RemoteDrained => "remote_drained",
            CallInput::PendingTimedOut => "pending_timed_out",
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone)]
pub enum CallEffect {
    Emit(OutboundEvent),
    JoinRoom(RoomCredential),
    LeaveRoom,
}

/// Result of a valid transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: CallPhase,
    pub effects: Vec<CallEffect>,
}

impl Transition {
    fn to(next: CallPhase) -> Self {
        Self {
            next,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: CallEffect) -> Self {
        self.effects.push(effect);
        self
    }

    fn with_all(mut self, effects: impl IntoIterator<Item = CallEffect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{input} is not valid while {phase}")]
pub struct InvalidTransition {
    pub phase: &'static str,
    pub input: &'static str,
}

impl CallPhase {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            CallPhase::Idle => "idle",
            CallPhase::AwaitingCredential { .. } => "awaiting_credential",
            CallPhase::IncomingPending { .. } => "incoming_pending",
            CallPhase::Connecting { .. } => "connecting",
            CallPhase::Connected { .. } => "connected",
        }
    }

    /// The call the local user is in or trying to set up.
    #[must_use]
    pub fn current_call(&self) -> Option<&CallInfo> {
        match self {
            CallPhase::AwaitingCredential { call, .. }
            | CallPhase::Connecting { call }
            | CallPhase::Connected { call } => Some(call),
            CallPhase::Idle | CallPhase::IncomingPending { .. } => None,
        }
    }

    #[must_use]
    pub fn incoming_call(&self) -> Option<&IncomingCallInfo> {
        match self {
            CallPhase::IncomingPending { incoming } => Some(incoming),
            _ => None,
        }
    }

    /// Whether a call or an unanswered offer is held.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !matches!(self, CallPhase::Idle)
    }

    /// Whether the pending-call deadline applies to this phase.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            CallPhase::AwaitingCredential { .. } | CallPhase::IncomingPending { .. }
        )
    }

    /// Decide the transition for `input`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when `input` does not apply to the
    /// current phase (including duplicate credentials and terminal events
    /// for another call).
    pub fn apply(&self, input: CallInput) -> Result<Transition, InvalidTransition> {
        let invalid = InvalidTransition {
            phase: self.name(),
            input: input.name(),
        };

        match (self, input) {
            (CallPhase::Idle, CallInput::InitiateRequested(call)) => {
                let receiver_id = call.other_user.id.clone();
                let emit = OutboundEvent::CallInitiate {
                    receiver_id,
                    call_type: call.call_kind,
                    chat_id: call.chat_id.clone(),
                    session_id: call.session_id.clone(),
                };
                Ok(Transition::to(CallPhase::AwaitingCredential {
                    call,
                    direction: CallDirection::Outgoing,
                })
                .with(CallEffect::Emit(emit)))
            }

            (
                CallPhase::AwaitingCredential {
                    call,
                    direction: CallDirection::Outgoing,
                },
                CallInput::CallInitiated {
                    call_id,
                    credential,
                },
            ) => {
                let call = CallInfo {
                    call_id,
                    channel_name: credential.channel_name.clone(),
                    ..call.clone()
                };
                Ok(Transition::to(CallPhase::Connecting { call })
                    .with(CallEffect::JoinRoom(credential)))
            }

            (CallPhase::Idle, CallInput::IncomingSignaled(incoming)) => {
                Ok(Transition::to(CallPhase::IncomingPending { incoming }))
            }

            // Busy: decline the new offer and keep what we have
            (phase, CallInput::IncomingSignaled(incoming)) => {
                if phase.holds_call_id(incoming.call_id()) {
                    return Err(invalid);
                }
                Ok(Transition::to(phase.clone()).with(CallEffect::Emit(
                    OutboundEvent::CallReject {
                        call_id: incoming.call.call_id,
                    },
                )))
            }

            (CallPhase::IncomingPending { incoming }, CallInput::AcceptRequested) => {
                let call_id = incoming.call_id().to_string();
                Ok(Transition::to(CallPhase::AwaitingCredential {
                    call: incoming.clone().into_accepted(),
                    direction: CallDirection::Incoming,
                })
                .with(CallEffect::Emit(OutboundEvent::CallAccept { call_id })))
            }

            (CallPhase::IncomingPending { incoming }, CallInput::RejectRequested) => {
                Ok(Transition::to(CallPhase::Idle).with(CallEffect::Emit(
                    OutboundEvent::CallReject {
                        call_id: incoming.call_id().to_string(),
                    },
                )))
            }

            (
                CallPhase::AwaitingCredential {
                    call,
                    direction: CallDirection::Incoming,
                },
                CallInput::CallAccepted {
                    call_id,
                    credential,
                },
            ) if call.matches(&call_id) => {
                let call = CallInfo {
                    call_id,
                    channel_name: credential.channel_name.clone(),
                    ..call.clone()
                };
                Ok(Transition::to(CallPhase::Connecting { call })
                    .with(CallEffect::JoinRoom(credential)))
            }

            (CallPhase::Connecting { call }, CallInput::TransportConnected { media_uid }) => {
                let emit = OutboundEvent::CallUserJoinedChannel {
                    call_id: call.call_id.clone(),
                    media_uid,
                };
                Ok(Transition::to(CallPhase::Connected { call: call.clone() })
                    .with(CallEffect::Emit(emit)))
            }

            (CallPhase::Connecting { call }, CallInput::TransportFailed) => {
                let mut transition = Transition::to(CallPhase::Idle);
                if call.has_call_id() {
                    transition = transition.with(CallEffect::Emit(OutboundEvent::CallEnd {
                        call_id: call.call_id.clone(),
                    }));
                }
                Ok(transition)
            }

            (
                CallPhase::Connecting { call } | CallPhase::Connected { call },
                CallInput::TransportLost,
            ) => Ok(Transition::to(CallPhase::Idle).with_all(end_emits(call))),

            (phase, CallInput::Terminal { call_id }) if phase.matches_terminal(&call_id) => {
                Ok(Transition::to(CallPhase::Idle).with(CallEffect::LeaveRoom))
            }

            (
                CallPhase::AwaitingCredential { call, .. }
                | CallPhase::Connecting { call }
                | CallPhase::Connected { call },
                CallInput::EndRequested,
            ) => Ok(Transition::to(CallPhase::Idle)
                .with_all(end_emits(call))
                .with(CallEffect::LeaveRoom)),

            (CallPhase::Connected { .. }, CallInput::RemoteDrained) => {
                Ok(Transition::to(CallPhase::Idle).with(CallEffect::LeaveRoom))
            }

            (CallPhase::AwaitingCredential { call, .. }, CallInput::PendingTimedOut) => {
                let mut transition = Transition::to(CallPhase::Idle);
                if call.has_call_id() {
                    transition = transition.with(CallEffect::Emit(OutboundEvent::CallEnd {
                        call_id: call.call_id.clone(),
                    }));
                }
                Ok(transition.with(CallEffect::LeaveRoom))
            }

            (CallPhase::IncomingPending { incoming }, CallInput::PendingTimedOut) => {
                Ok(Transition::to(CallPhase::Idle).with(CallEffect::Emit(
                    OutboundEvent::CallReject {
                        call_id: incoming.call_id().to_string(),
                    },
                )))
            }

            _ => Err(invalid),
        }
    }

    /// Whether the held call or offer has exactly `call_id`.
    fn holds_call_id(&self, call_id: &str) -> bool {
        match self {
            CallPhase::IncomingPending { incoming } => incoming.call_id() == call_id,
            other => other
                .current_call()
                .is_some_and(|call| call.has_call_id() && call.call_id == call_id),
        }
    }

    /// Whether a terminal event for `call_id` ends what is held. A
    /// placeholder without an id matches any call id.
    fn matches_terminal(&self, call_id: &str) -> bool {
        match self {
            CallPhase::Idle => false,
            CallPhase::IncomingPending { incoming } => incoming.call_id() == call_id,
            other => other
                .current_call()
                .is_some_and(|call| call.matches(call_id)),
        }
    }
}

/// CALL_END then CALL_USER_LEFT_CHANNEL, only once signaling knows the call.
fn end_emits(call: &CallInfo) -> Vec<CallEffect> {
    if !call.has_call_id() {
        return Vec::new();
    }
    vec![
        CallEffect::Emit(OutboundEvent::CallEnd {
            call_id: call.call_id.clone(),
        }),
        CallEffect::Emit(OutboundEvent::CallUserLeftChannel {
            call_id: call.call_id.clone(),
        }),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::models::{CallKind, UserIdentity};
    use secrecy::SecretString;

    fn credential(channel: &str, uid: u32) -> RoomCredential {
        RoomCredential {
            channel_name: channel.to_string(),
            token: SecretString::from("t1"),
            uid,
        }
    }

    fn placeholder() -> CallInfo {
        CallInfo::placeholder(UserIdentity::new("student-7", ""), CallKind::Video)
    }

    fn connected(call_id: &str) -> CallPhase {
        CallPhase::Connected {
            call: CallInfo {
                call_id: call_id.to_string(),
                channel_name: "room1".to_string(),
                ..placeholder()
            },
        }
    }

    fn incoming(call_id: &str) -> IncomingCallInfo {
        IncomingCallInfo::new(
            call_id,
            "room2",
            CallKind::Audio,
            UserIdentity::new("tutor-1", "Ms. Tutor"),
        )
    }

    fn emitted(transition: &Transition) -> Vec<&'static str> {
        transition
            .effects
            .iter()
            .filter_map(|effect| match effect {
                CallEffect::Emit(event) => Some(event.name()),
                _ => None,
            })
            .collect()
    }

    fn leaves(transition: &Transition) -> bool {
        transition
            .effects
            .iter()
            .any(|effect| matches!(effect, CallEffect::LeaveRoom))
    }

    #[test]
    fn test_outgoing_happy_path() {
        let phase = CallPhase::Idle;

        let t = phase
            .apply(CallInput::InitiateRequested(placeholder()))
            .unwrap();
        assert_eq!(emitted(&t), vec!["CALL_INITIATE"]);
        assert!(t.next.is_pending());

        let t = t
            .next
            .apply(CallInput::CallInitiated {
                call_id: "c1".to_string(),
                credential: credential("room1", 1),
            })
            .unwrap();
        let call = t.next.current_call().unwrap();
        assert_eq!(call.call_id, "c1");
        assert_eq!(call.channel_name, "room1");
        assert!(matches!(t.effects[0], CallEffect::JoinRoom(_)));

        let t = t
            .next
            .apply(CallInput::TransportConnected { media_uid: 1 })
            .unwrap();
        assert_eq!(emitted(&t), vec!["CALL_USER_JOINED_CHANNEL"]);
        assert!(matches!(t.next, CallPhase::Connected { .. }));
    }

    #[test]
    fn test_initiate_carries_chat_and_session() {
        let call = CallInfo {
            chat_id: Some("chat-1".to_string()),
            session_id: Some("sess-1".to_string()),
            ..placeholder()
        };

        let t = CallPhase::Idle
            .apply(CallInput::InitiateRequested(call))
            .unwrap();

        match &t.effects[0] {
            CallEffect::Emit(OutboundEvent::CallInitiate {
                receiver_id,
                chat_id,
                session_id,
                ..
            }) => {
                assert_eq!(receiver_id, "student-7");
                assert_eq!(chat_id.as_deref(), Some("chat-1"));
                assert_eq!(session_id.as_deref(), Some("sess-1"));
            }
            other => unreachable!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn test_accept_waits_for_credential() {
        let phase = CallPhase::IncomingPending {
            incoming: incoming("c2"),
        };

        let t = phase.apply(CallInput::AcceptRequested).unwrap();
        assert_eq!(emitted(&t), vec!["CALL_ACCEPT"]);
        assert_eq!(t.next.current_call().unwrap().other_user.id, "tutor-1");
        assert!(t.next.incoming_call().is_none());

        let t = t
            .next
            .apply(CallInput::CallAccepted {
                call_id: "c2".to_string(),
                credential: credential("room2", 2),
            })
            .unwrap();
        assert!(matches!(t.next, CallPhase::Connecting { .. }));
        assert!(matches!(t.effects[0], CallEffect::JoinRoom(ref c) if c.uid == 2));
    }

    #[test]
    fn test_call_accepted_for_other_call_is_invalid() {
        let phase = CallPhase::IncomingPending {
            incoming: incoming("c2"),
        };
        let t = phase.apply(CallInput::AcceptRequested).unwrap();

        let err = t
            .next
            .apply(CallInput::CallAccepted {
                call_id: "c9".to_string(),
                credential: credential("room9", 2),
            })
            .unwrap_err();
        assert_eq!(err.input, "call_accepted");
    }

    #[test]
    fn test_duplicate_credential_while_connected_is_invalid() {
        let err = connected("c1")
            .apply(CallInput::CallAccepted {
                call_id: "c1".to_string(),
                credential: credential("room1", 1),
            })
            .unwrap_err();
        assert_eq!(err.phase, "connected");

        assert!(connected("c1")
            .apply(CallInput::CallInitiated {
                call_id: "c1".to_string(),
                credential: credential("room1", 1),
            })
            .is_err());
    }

    #[test]
    fn test_reject_returns_to_idle() {
        let phase = CallPhase::IncomingPending {
            incoming: incoming("c2"),
        };
        let t = phase.apply(CallInput::RejectRequested).unwrap();
        assert_eq!(t.next, CallPhase::Idle);
        assert_eq!(emitted(&t), vec!["CALL_REJECT"]);
    }

    #[test]
    fn test_accept_without_offer_is_invalid() {
        let err = CallPhase::Idle
            .apply(CallInput::AcceptRequested)
            .unwrap_err();
        assert_eq!(err.to_string(), "accept_requested is not valid while idle");
        assert!(CallPhase::Idle.apply(CallInput::RejectRequested).is_err());
        assert!(CallPhase::Idle.apply(CallInput::EndRequested).is_err());
    }

    #[test]
    fn test_incoming_while_busy_is_rejected() {
        let t = connected("c1")
            .apply(CallInput::IncomingSignaled(incoming("c2")))
            .unwrap();
        assert_eq!(t.next, connected("c1"));
        match &t.effects[0] {
            CallEffect::Emit(OutboundEvent::CallReject { call_id }) => assert_eq!(call_id, "c2"),
            other => unreachable!("unexpected effect: {other:?}"),
        }

        let ringing = CallPhase::IncomingPending {
            incoming: incoming("c2"),
        };
        let t = ringing
            .apply(CallInput::IncomingSignaled(incoming("c3")))
            .unwrap();
        assert_eq!(t.next.incoming_call().unwrap().call_id(), "c2");
    }

    #[test]
    fn test_duplicate_incoming_offer_is_invalid() {
        let ringing = CallPhase::IncomingPending {
            incoming: incoming("c2"),
        };
        assert!(ringing
            .apply(CallInput::IncomingSignaled(incoming("c2")))
            .is_err());
    }

    #[test]
    fn test_terminal_matches_call_id() {
        let t = connected("c1")
            .apply(CallInput::Terminal {
                call_id: "c1".to_string(),
            })
            .unwrap();
        assert_eq!(t.next, CallPhase::Idle);
        assert!(leaves(&t));
        assert!(emitted(&t).is_empty());

        assert!(connected("c1")
            .apply(CallInput::Terminal {
                call_id: "c7".to_string(),
            })
            .is_err());
        assert!(CallPhase::Idle
            .apply(CallInput::Terminal {
                call_id: "c1".to_string(),
            })
            .is_err());
    }

    #[test]
    fn test_terminal_matches_placeholder_and_incoming() {
        let awaiting = CallPhase::AwaitingCredential {
            call: placeholder(),
            direction: CallDirection::Outgoing,
        };
        let t = awaiting
            .apply(CallInput::Terminal {
                call_id: "anything".to_string(),
            })
            .unwrap();
        assert_eq!(t.next, CallPhase::Idle);

        let ringing = CallPhase::IncomingPending {
            incoming: incoming("c2"),
        };
        let t = ringing
            .apply(CallInput::Terminal {
                call_id: "c2".to_string(),
            })
            .unwrap();
        assert_eq!(t.next, CallPhase::Idle);
        assert!(t.next.incoming_call().is_none());
    }

    #[test]
    fn test_end_emits_only_with_call_id() {
        let t = connected("c1").apply(CallInput::EndRequested).unwrap();
        assert_eq!(emitted(&t), vec!["CALL_END", "CALL_USER_LEFT_CHANNEL"]);
        assert!(leaves(&t));

        let awaiting = CallPhase::AwaitingCredential {
            call: placeholder(),
            direction: CallDirection::Outgoing,
        };
        let t = awaiting.apply(CallInput::EndRequested).unwrap();
        assert!(emitted(&t).is_empty());
        assert!(leaves(&t));
    }

    #[test]
    fn test_transport_failure_ends_call() {
        let connecting = CallPhase::Connecting {
            call: CallInfo {
                call_id: "c1".to_string(),
                ..placeholder()
            },
        };
        let t = connecting.apply(CallInput::TransportFailed).unwrap();
        assert_eq!(t.next, CallPhase::Idle);
        assert_eq!(emitted(&t), vec!["CALL_END"]);
        assert!(!leaves(&t));
    }

    #[test]
    fn test_transport_lost_tells_the_other_side() {
        let t = connected("c1").apply(CallInput::TransportLost).unwrap();
        assert_eq!(t.next, CallPhase::Idle);
        assert_eq!(emitted(&t), vec!["CALL_END", "CALL_USER_LEFT_CHANNEL"]);
        assert!(!leaves(&t));
    }

    #[test]
    fn test_remote_drained_only_when_connected() {
        let t = connected("c1").apply(CallInput::RemoteDrained).unwrap();
        assert_eq!(t.next, CallPhase::Idle);
        assert!(leaves(&t));
        assert!(emitted(&t).is_empty());

        let connecting = CallPhase::Connecting {
            call: placeholder(),
        };
        assert!(connecting.apply(CallInput::RemoteDrained).is_err());
    }

    #[test]
    fn test_pending_timeouts() {
        let ringing = CallPhase::IncomingPending {
            incoming: incoming("c2"),
        };
        let t = ringing.apply(CallInput::PendingTimedOut).unwrap();
        assert_eq!(emitted(&t), vec!["CALL_REJECT"]);
        assert_eq!(t.next, CallPhase::Idle);

        let awaiting = CallPhase::AwaitingCredential {
            call: placeholder(),
            direction: CallDirection::Outgoing,
        };
        let t = awaiting.apply(CallInput::PendingTimedOut).unwrap();
        assert!(emitted(&t).is_empty());
        assert!(leaves(&t));

        assert!(connected("c1").apply(CallInput::PendingTimedOut).is_err());
    }
}
