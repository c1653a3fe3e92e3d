//! `MediaTransportBinding` - call lifecycle over a [`MediaEngine`].
//!
//! The binding is owned by exactly one orchestrator actor, so it needs no
//! interior locking. All engine failures are logged and converted into
//! `ConnectionState::Error` plus a retained message; nothing here panics.
//!
//! # Join sequence
//!
//! 1. Application id check (configuration error if missing)
//! 2. Reset call-scoped state (mute flags, remote participants)
//! 3. `Connecting`: engine join, microphone track, camera track, publish
//! 4. `Connected`
//!
//! Step 3 runs under the join deadline. A failure at any step closes the tracks created so far without ever
//! publishing them and leaves the room if it was joined.

use super::{
    ConnectionState, EngineEvent, LocalTrackId, MediaEngine, RemoteParticipant, TrackKind,
};
use crate::config::DEFAULT_JOIN_TIMEOUT_SECONDS;
use crate::errors::TransportError;
use crate::observability::metrics;

use secrecy::SecretString;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Result of applying one engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEventOutcome {
    /// Nothing observable changed (stale event, local uid, duplicate).
    Unchanged,
    /// The remote participant set changed.
    RemoteUsersChanged,
    /// A participant left and nobody remains in the room.
    RemoteUsersDrained,
    /// The engine dropped the room connection; local resources are released.
    ConnectionLost,
}

#[derive(Debug, Clone, Copy)]
struct LocalTrack {
    id: LocalTrackId,
    enabled: bool,
}

impl LocalTrack {
    fn new(id: LocalTrackId) -> Self {
        Self { id, enabled: true }
    }
}

/// Narrow facade over the media engine for one call at a time.
pub struct MediaTransportBinding {
    engine: Arc<dyn MediaEngine>,
    app_id: Option<String>,
    join_timeout: Duration,
    state: ConnectionState,
    error: Option<String>,
    /// Uid we joined (or are joining) as; events about it are ignored.
    local_uid: Option<u32>,
    /// Whether the engine room join succeeded and a leave is owed.
    joined_room: bool,
    local_audio: Option<LocalTrack>,
    local_video: Option<LocalTrack>,
    remote_users: BTreeMap<u32, RemoteParticipant>,
    is_audio_muted: bool,
    is_video_muted: bool,
}

impl MediaTransportBinding {
    /// Create an idle binding. A missing `app_id` is not an error until
    /// [`join`](Self::join) is called.
    pub fn new(engine: Arc<dyn MediaEngine>, app_id: Option<String>) -> Self {
        Self {
            engine,
            app_id,
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECONDS),
            state: ConnectionState::Idle,
            error: None,
            local_uid: None,
            joined_room: false,
            local_audio: None,
            local_video: None,
            remote_users: BTreeMap::new(),
            is_audio_muted: false,
            is_video_muted: false,
        }
    }

    #[must_use]
    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    /// Route engine room events into a fresh channel of `buffer` capacity.
    pub fn attach_events(&self, buffer: usize) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(buffer);
        self.engine.set_event_sink(Some(tx));
        rx
    }

    /// Stop routing engine room events.
    pub fn detach_events(&self) {
        self.engine.set_event_sink(None);
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Last transport error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_audio_muted(&self) -> bool {
        self.is_audio_muted
    }

    #[must_use]
    pub fn is_video_muted(&self) -> bool {
        self.is_video_muted
    }

    #[must_use]
    pub fn has_local_audio(&self) -> bool {
        self.local_audio.is_some()
    }

    #[must_use]
    pub fn has_local_video(&self) -> bool {
        self.local_video.is_some()
    }

    /// Remote participants ordered by uid.
    #[must_use]
    pub fn remote_users(&self) -> Vec<RemoteParticipant> {
        self.remote_users.values().cloned().collect()
    }

    /// Join `channel` with the per-call credential and publish local audio
    /// and video.
    ///
    /// # Errors
    ///
    /// Returns the failure that moved the binding to `ConnectionState::Error`,
    /// or [`TransportError::AlreadyJoined`] (state untouched) when a room is
    /// already joined or being joined.
    #[instrument(skip_all, name = "call.transport.join", fields(channel = %channel, uid = uid))]
    pub async fn join(
        &mut self,
        channel: &str,
        token: &SecretString,
        uid: u32,
    ) -> Result<(), TransportError> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Disconnecting
        ) {
            warn!(
                target: "call.transport",
                state = %self.state,
                "Join requested while a room is already active"
            );
            return Err(TransportError::AlreadyJoined);
        }

        let Some(app_id) = self.app_id.clone() else {
            let err = TransportError::Configuration(
                "transport application id is not configured".to_string(),
            );
            self.fail(&err);
            return Err(err);
        };

        self.reset_call_scope();
        self.local_uid = Some(uid);
        self.state = ConnectionState::Connecting;
        debug!(target: "call.transport", "Joining room");

        let started = Instant::now();
        let deadline = self.join_timeout;
        let result = match tokio::time::timeout(deadline, self.connect(&app_id, channel, token, uid))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(deadline)),
        };

        match result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                metrics::record_transport_join(started.elapsed(), "success");
                info!(target: "call.transport", "Joined room and published local tracks");
                Ok(())
            }
            Err(e) => {
                self.release_local_resources().await;
                self.fail(&e);
                metrics::record_transport_join(started.elapsed(), "error");
                Err(e)
            }
        }
    }

    async fn connect(
        &mut self,
        app_id: &str,
        channel: &str,
        token: &SecretString,
        uid: u32,
    ) -> Result<(), TransportError> {
        self.engine.join(app_id, channel, token, uid).await?;
        self.joined_room = true;

        let audio = self.engine.create_local_track(TrackKind::Audio).await?;
        self.local_audio = Some(LocalTrack::new(audio));

        let video = self.engine.create_local_track(TrackKind::Video).await?;
        self.local_video = Some(LocalTrack::new(video));

        self.engine.publish(&[audio, video]).await
    }

    /// Tear down the local connection. A no-op when already idle; safe to
    /// call any number of times.
    #[instrument(skip_all, name = "call.transport.leave")]
    pub async fn leave(&mut self) {
        if self.state == ConnectionState::Idle && !self.holds_local_resources() {
            debug!(target: "call.transport", "Leave requested while idle, nothing to do");
            return;
        }

        self.state = ConnectionState::Disconnecting;
        self.release_local_resources().await;
        self.reset_call_scope();
        self.state = ConnectionState::Idle;

        info!(target: "call.transport", "Left room");
    }

    /// Flip the local microphone track. No-op without a track.
    pub async fn toggle_audio(&mut self) {
        self.toggle(TrackKind::Audio).await;
    }

    /// Flip the local camera track. No-op without a track.
    pub async fn toggle_video(&mut self) {
        self.toggle(TrackKind::Video).await;
    }

    async fn toggle(&mut self, kind: TrackKind) {
        let (slot, muted) = match kind {
            TrackKind::Audio => (&mut self.local_audio, &mut self.is_audio_muted),
            TrackKind::Video => (&mut self.local_video, &mut self.is_video_muted),
        };

        let Some(track) = slot.as_mut() else {
            debug!(target: "call.transport", kind = ?kind, "Toggle ignored, no local track");
            return;
        };

        let enable = !track.enabled;
        match self.engine.set_track_enabled(track.id, enable).await {
            Ok(()) => {
                track.enabled = enable;
                *muted = !enable;
                debug!(target: "call.transport", kind = ?kind, muted = !enable, "Local track toggled");
            }
            Err(e) => {
                warn!(target: "call.transport", kind = ?kind, error = %e, "Failed to toggle local track");
            }
        }
    }

    /// Apply one engine room event.
    pub async fn handle_engine_event(&mut self, event: EngineEvent) -> EngineEventOutcome {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(target: "call.transport", event = ?event, state = %self.state, "Dropping stale engine event");
            return EngineEventOutcome::Unchanged;
        }

        let outcome = match event {
            EngineEvent::UserJoined { uid } => {
                if self.is_local(uid) || self.remote_users.contains_key(&uid) {
                    return EngineEventOutcome::Unchanged;
                }
                self.remote_users.insert(uid, RemoteParticipant::new(uid));
                EngineEventOutcome::RemoteUsersChanged
            }
            EngineEvent::UserPublished { uid, kind } => {
                if self.is_local(uid) {
                    return EngineEventOutcome::Unchanged;
                }
                let participant = self
                    .remote_users
                    .entry(uid)
                    .or_insert_with(|| RemoteParticipant::new(uid));
                match kind {
                    TrackKind::Audio => participant.has_audio = true,
                    TrackKind::Video => participant.has_video = true,
                }
                EngineEventOutcome::RemoteUsersChanged
            }
            EngineEvent::UserUnpublished { uid, kind } => {
                let Some(participant) = self.remote_users.get_mut(&uid) else {
                    return EngineEventOutcome::Unchanged;
                };
                match kind {
                    TrackKind::Audio => participant.has_audio = false,
                    TrackKind::Video => participant.has_video = false,
                }
                // Only UserLeft removes a participant, so a remote that stops
                // publishing both tracks stays in the room
                if !participant.is_publishing() {
                    debug!(target: "call.transport", uid, "Remote participant has no published tracks");
                }
                EngineEventOutcome::RemoteUsersChanged
            }
            EngineEvent::UserLeft { uid } => {
                if self.remote_users.remove(&uid).is_none() {
                    return EngineEventOutcome::Unchanged;
                }
                if self.remote_users.is_empty() {
                    EngineEventOutcome::RemoteUsersDrained
                } else {
                    EngineEventOutcome::RemoteUsersChanged
                }
            }
            EngineEvent::ConnectionLost { reason } => {
                warn!(target: "call.transport", reason = %reason, "Engine lost the room connection");
                self.release_local_resources().await;
                self.reset_call_scope();
                self.fail(&TransportError::Engine(reason));
                return EngineEventOutcome::ConnectionLost;
            }
        };

        metrics::set_remote_participants(self.remote_users.len());
        outcome
    }

    fn is_local(&self, uid: u32) -> bool {
        self.local_uid == Some(uid)
    }

    fn holds_local_resources(&self) -> bool {
        self.joined_room || self.local_audio.is_some() || self.local_video.is_some()
    }

    /// Close local tracks and leave the room if joined. Engine failures are
    /// logged; the binding never keeps a half-released track.
    async fn release_local_resources(&mut self) {
        if let Some(track) = self.local_audio.take() {
            self.engine.close_track(track.id);
        }
        if let Some(track) = self.local_video.take() {
            self.engine.close_track(track.id);
        }
        if self.joined_room {
            if let Err(e) = self.engine.leave().await {
                warn!(target: "call.transport", error = %e, "Engine leave failed, continuing teardown");
            }
            self.joined_room = false;
        }
        self.local_uid = None;
    }

    fn reset_call_scope(&mut self) {
        self.remote_users.clear();
        self.is_audio_muted = false;
        self.is_video_muted = false;
        self.error = None;
        metrics::set_remote_participants(0);
    }

    fn fail(&mut self, err: &TransportError) {
        error!(target: "call.transport", error = %err, "Transport failure");
        metrics::record_transport_error(err.kind());
        self.state = ConnectionState::Error;
        self.error = Some(err.to_string());
    }
}
