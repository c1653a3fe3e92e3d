//! Message types for the orchestrator mailbox and its published snapshot.
//!
//! Commands use `tokio::sync::mpsc` with `tokio::sync::oneshot` replies.

use crate::errors::CallError;
use crate::models::{CallInfo, CallKind, IncomingCallInfo};
use crate::transport::{ConnectionState, RemoteParticipant};
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Parameters of a locally initiated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub receiver_id: String,
    /// Display name for the placeholder; empty when not known yet.
    pub receiver_name: String,
    pub call_kind: CallKind,
    pub chat_id: Option<String>,
    pub session_id: Option<String>,
}

/// Messages sent to `CallOrchestrator`.
#[derive(Debug)]
pub enum OrchestratorMessage {
    /// Start an outgoing call.
    InitiateCall {
        request: CallRequest,
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },

    /// Accept the ringing incoming call.
    AcceptCall {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },

    /// Decline the ringing incoming call.
    RejectCall {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },

    /// End the current call and leave the transport room.
    EndCall {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },

    /// Flip the local microphone.
    ToggleAudio {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },

    /// Flip the local camera.
    ToggleVideo {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },

    /// Read the current snapshot after all earlier commands are applied.
    GetSnapshot {
        respond_to: oneshot::Sender<CallSnapshot>,
    },
}

/// Everything a UI needs to render the call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSnapshot {
    /// Transport lifecycle state.
    pub call_state: ConnectionState,
    pub current_call: Option<CallInfo>,
    pub incoming_call: Option<IncomingCallInfo>,
    pub is_audio_muted: bool,
    pub is_video_muted: bool,
    pub has_local_audio: bool,
    pub has_local_video: bool,
    pub remote_users: Vec<RemoteParticipant>,
    /// Last transport error message.
    pub error: Option<String>,
    /// When the transport connected for the current call.
    pub connected_at: Option<DateTime<Utc>>,
}

impl CallSnapshot {
    /// Whether the transport is connected.
    #[must_use]
    pub fn is_in_call(&self) -> bool {
        self.call_state == ConnectionState::Connected
    }

    /// Whether an incoming call is ringing.
    #[must_use]
    pub fn is_receiving_call(&self) -> bool {
        self.incoming_call.is_some()
    }
}
