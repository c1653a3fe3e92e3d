//! Media transport: the engine seam and the binding the orchestrator drives.
//!
//! [`MediaEngine`] is implemented by the embedding application on top of its
//! real-time media SDK. [`MediaTransportBinding`] wraps it with the call
//! lifecycle (`Idle -> Connecting -> Connected -> Disconnecting -> Idle`,
//! with `Error` reachable from any join step) and owns the local tracks.

pub mod binding;

pub use binding::{EngineEventOutcome, MediaTransportBinding};

use crate::errors::TransportError;
use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use tokio::sync::mpsc;

/// Transport connection lifecycle, surfaced to the UI as the call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of local or remote media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Engine-assigned handle for a local track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalTrackId(pub u64);

/// A remote participant currently present in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    /// Media uid of the participant.
    pub uid: u32,
    pub has_audio: bool,
    pub has_video: bool,
}

impl RemoteParticipant {
    #[must_use]
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            has_audio: false,
            has_video: false,
        }
    }

    #[must_use]
    pub fn is_publishing(&self) -> bool {
        self.has_audio || self.has_video
    }
}

/// Callbacks raised by the engine about the joined room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    UserJoined { uid: u32 },
    UserPublished { uid: u32, kind: TrackKind },
    UserUnpublished { uid: u32, kind: TrackKind },
    UserLeft { uid: u32 },
    /// The engine lost its connection to the room.
    ConnectionLost { reason: String },
}

/// Facade over a real-time media SDK.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Join `channel` with the per-call `token` as `uid`.
    async fn join(
        &self,
        app_id: &str,
        channel: &str,
        token: &SecretString,
        uid: u32,
    ) -> Result<(), TransportError>;

    /// Capture a local microphone or camera track (not yet published).
    async fn create_local_track(&self, kind: TrackKind) -> Result<LocalTrackId, TransportError>;

    /// Publish local tracks to the joined room.
    async fn publish(&self, tracks: &[LocalTrackId]) -> Result<(), TransportError>;

    /// Enable or disable a local track without unpublishing it.
    async fn set_track_enabled(
        &self,
        track: LocalTrackId,
        enabled: bool,
    ) -> Result<(), TransportError>;

    /// Stop capture and release a local track.
    fn close_track(&self, track: LocalTrackId);

    /// Leave the joined room.
    async fn leave(&self) -> Result<(), TransportError>;

    /// Install (or clear, with `None`) the sink for room events.
    fn set_event_sink(&self, sink: Option<mpsc::Sender<EngineEvent>>);
}
