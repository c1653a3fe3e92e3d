//! Signaling event contract and its JSON wire codec.
//!
//! Every event travels as `{"event": "<NAME>", "data": {...}}` with
//! camelCase payload fields. Outbound events are only ever encoded and
//! inbound events only ever decoded; room tokens are decoded straight into
//! [`SecretString`] so they never show up in `Debug` output.

use crate::errors::SignalingError;
use crate::models::{CallKind, UserIdentity};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum OutboundEvent {
    /// Request to start a call.
    CallInitiate {
        receiver_id: String,
        call_type: CallKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        chat_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// Accept an incoming call.
    CallAccept { call_id: String },
    /// Decline an incoming call.
    CallReject { call_id: String },
    /// End the current call.
    CallEnd { call_id: String },
    /// The local user left the transport room.
    CallUserLeftChannel { call_id: String },
    /// The local transport join succeeded.
    CallUserJoinedChannel {
        call_id: String,
        #[serde(rename = "agoraUid")]
        media_uid: u32,
    },
}

impl OutboundEvent {
    /// Literal wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            OutboundEvent::CallInitiate { .. } => "CALL_INITIATE",
            OutboundEvent::CallAccept { .. } => "CALL_ACCEPT",
            OutboundEvent::CallReject { .. } => "CALL_REJECT",
            OutboundEvent::CallEnd { .. } => "CALL_END",
            OutboundEvent::CallUserLeftChannel { .. } => "CALL_USER_LEFT_CHANNEL",
            OutboundEvent::CallUserJoinedChannel { .. } => "CALL_USER_JOINED_CHANNEL",
        }
    }
}

/// Events received from the signaling service.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum InboundEvent {
    /// Signaling accepted our call request; credential to join the room.
    CallInitiated {
        call_id: String,
        channel_name: String,
        token: SecretString,
        uid: u32,
        call_type: CallKind,
    },
    /// Another user is calling us.
    IncomingCall {
        call_id: String,
        channel_name: String,
        call_type: CallKind,
        caller: UserIdentity,
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Credential to join the room after we accepted.
    CallAccepted {
        call_id: String,
        channel_name: String,
        token: SecretString,
        uid: u32,
    },
    /// The callee accepted (caller side, informational).
    CallAcceptedByReceiver { call_id: String },
    /// The call was declined.
    CallRejected { call_id: String },
    /// The call ended, by either party.
    CallEnded {
        call_id: String,
        #[serde(default)]
        duration: Option<u64>,
    },
    /// The call was cancelled before connecting.
    CallCancelled { call_id: String },
    /// A participant joined the room (informational).
    CallParticipantJoined {
        call_id: String,
        user_id: String,
        #[serde(rename = "agoraUid")]
        media_uid: u32,
        active_participants: u32,
    },
    /// A participant left the room.
    CallParticipantLeft {
        call_id: String,
        user_id: String,
        active_participants: u32,
    },
    /// Both parties are connected (informational).
    CallBothConnected {
        call_id: String,
        #[serde(default)]
        message: String,
    },
    /// Signaling-side error.
    CallError { message: String },
}

impl InboundEvent {
    /// Literal wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            InboundEvent::CallInitiated { .. } => "CALL_INITIATED",
            InboundEvent::IncomingCall { .. } => "INCOMING_CALL",
            InboundEvent::CallAccepted { .. } => "CALL_ACCEPTED",
            InboundEvent::CallAcceptedByReceiver { .. } => "CALL_ACCEPTED_BY_RECEIVER",
            InboundEvent::CallRejected { .. } => "CALL_REJECTED",
            InboundEvent::CallEnded { .. } => "CALL_ENDED",
            InboundEvent::CallCancelled { .. } => "CALL_CANCELLED",
            InboundEvent::CallParticipantJoined { .. } => "CALL_PARTICIPANT_JOINED",
            InboundEvent::CallParticipantLeft { .. } => "CALL_PARTICIPANT_LEFT",
            InboundEvent::CallBothConnected { .. } => "CALL_BOTH_CONNECTED",
            InboundEvent::CallError { .. } => "CALL_ERROR",
        }
    }

    /// Call id carried by the event, if any.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            InboundEvent::CallInitiated { call_id, .. }
            | InboundEvent::IncomingCall { call_id, .. }
            | InboundEvent::CallAccepted { call_id, .. }
            | InboundEvent::CallAcceptedByReceiver { call_id }
            | InboundEvent::CallRejected { call_id }
            | InboundEvent::CallEnded { call_id, .. }
            | InboundEvent::CallCancelled { call_id }
            | InboundEvent::CallParticipantJoined { call_id, .. }
            | InboundEvent::CallParticipantLeft { call_id, .. }
            | InboundEvent::CallBothConnected { call_id, .. } => Some(call_id),
            InboundEvent::CallError { .. } => None,
        }
    }

    /// Whether this event unconditionally ends the call it refers to.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            InboundEvent::CallRejected { .. }
                | InboundEvent::CallEnded { .. }
                | InboundEvent::CallCancelled { .. }
        )
    }
}

/// Encode an outbound event to its JSON wire form.
pub fn encode_outbound(event: &OutboundEvent) -> Result<String, SignalingError> {
    serde_json::to_string(event).map_err(|e| SignalingError::Codec(e.to_string()))
}

/// Decode an inbound event from its JSON wire form.
pub fn decode_inbound(raw: &str) -> Result<InboundEvent, SignalingError> {
    serde_json::from_str(raw).map_err(|e| SignalingError::Codec(e.to_string()))
}
