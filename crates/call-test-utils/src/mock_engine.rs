//! Mock media engine for orchestrator testing.
//!
//! Provides a `MediaEngine` implementation that can be configured to:
//! - Reject the room join, a track creation or the publish step
//! - Delay the join (for timeout tests under paused time)
//! - Raise room events through the installed event sink
//!
//! # Example
//!
//! ```rust,ignore
//! use call_test_utils::MockEngine;
//!
//! let engine = MockEngine::builder()
//!     .fail_track(TrackKind::Video)
//!     .build();
//! ```

use async_trait::async_trait;
use call_session::errors::TransportError;
use call_session::transport::{EngineEvent, LocalTrackId, MediaEngine, TrackKind};
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A recorded room join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCall {
    pub app_id: String,
    pub channel: String,
    pub token: String,
    pub uid: u32,
}

/// Every engine call, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Join(JoinCall),
    CreateTrack(TrackKind),
    Publish(Vec<LocalTrackId>),
    SetTrackEnabled { track: LocalTrackId, enabled: bool },
    CloseTrack(LocalTrackId),
    Leave,
}

/// Mock media engine.
#[derive(Debug, Default)]
pub struct MockEngine {
    join_failure: Option<String>,
    track_failure: Option<TrackKind>,
    publish_failure: bool,
    join_delay: Option<Duration>,
    next_track: AtomicU64,
    calls: Mutex<Vec<EngineCall>>,
    sink: Mutex<Option<mpsc::Sender<EngineEvent>>>,
}

impl MockEngine {
    /// Create a new MockEngine builder.
    #[must_use]
    pub fn builder() -> MockEngineBuilder {
        MockEngineBuilder::default()
    }

    /// All calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Room joins made so far.
    #[must_use]
    pub fn joins(&self) -> Vec<JoinCall> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Join(join) => Some(join),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn join_count(&self) -> usize {
        self.joins().len()
    }

    #[must_use]
    pub fn leave_count(&self) -> usize {
        self.count(|call| matches!(call, EngineCall::Leave))
    }

    #[must_use]
    pub fn publish_count(&self) -> usize {
        self.count(|call| matches!(call, EngineCall::Publish(_)))
    }

    #[must_use]
    pub fn closed_tracks(&self) -> usize {
        self.count(|call| matches!(call, EngineCall::CloseTrack(_)))
    }

    /// Whether the orchestrator currently listens for room events.
    #[must_use]
    pub fn has_event_sink(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// Raise a room event as the SDK would.
    ///
    /// # Panics
    ///
    /// Panics if no event sink is installed.
    pub async fn emit(&self, event: EngineEvent) {
        let sink = self
            .sink
            .lock()
            .unwrap()
            .clone()
            .expect("no engine event sink installed");
        sink.send(event).await.expect("engine event sink closed");
    }

    fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    async fn join(
        &self,
        app_id: &str,
        channel: &str,
        token: &SecretString,
        uid: u32,
    ) -> Result<(), TransportError> {
        self.record(EngineCall::Join(JoinCall {
            app_id: app_id.to_string(),
            channel: channel.to_string(),
            token: token.expose_secret().to_string(),
            uid,
        }));

        if let Some(delay) = self.join_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.join_failure {
            Some(reason) => Err(TransportError::Join(reason.clone())),
            None => Ok(()),
        }
    }

    async fn create_local_track(&self, kind: TrackKind) -> Result<LocalTrackId, TransportError> {
        self.record(EngineCall::CreateTrack(kind));
        if self.track_failure == Some(kind) {
            return Err(TransportError::TrackCreation(format!(
                "{kind:?} device unavailable"
            )));
        }
        Ok(LocalTrackId(self.next_track.fetch_add(1, Ordering::SeqCst)))
    }

    async fn publish(&self, tracks: &[LocalTrackId]) -> Result<(), TransportError> {
        self.record(EngineCall::Publish(tracks.to_vec()));
        if self.publish_failure {
            return Err(TransportError::Publish("publish rejected".to_string()));
        }
        Ok(())
    }

    async fn set_track_enabled(
        &self,
        track: LocalTrackId,
        enabled: bool,
    ) -> Result<(), TransportError> {
        self.record(EngineCall::SetTrackEnabled { track, enabled });
        Ok(())
    }

    fn close_track(&self, track: LocalTrackId) {
        self.record(EngineCall::CloseTrack(track));
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.record(EngineCall::Leave);
        Ok(())
    }

    fn set_event_sink(&self, sink: Option<mpsc::Sender<EngineEvent>>) {
        *self.sink.lock().unwrap() = sink;
    }
}

/// Builder for MockEngine configuration.
#[derive(Debug, Default)]
pub struct MockEngineBuilder {
    join_failure: Option<String>,
    track_failure: Option<TrackKind>,
    publish_failure: bool,
    join_delay: Option<Duration>,
}

impl MockEngineBuilder {
    /// Reject every room join with `reason`.
    #[must_use]
    pub fn fail_join(mut self, reason: impl Into<String>) -> Self {
        self.join_failure = Some(reason.into());
        self
    }

    /// Fail creation of the `kind` track.
    #[must_use]
    pub fn fail_track(mut self, kind: TrackKind) -> Self {
        self.track_failure = Some(kind);
        self
    }

    /// Fail the publish step.
    #[must_use]
    pub fn fail_publish(mut self) -> Self {
        self.publish_failure = true;
        self
    }

    /// Hold every room join for `delay`.
    #[must_use]
    pub fn join_delay(mut self, delay: Duration) -> Self {
        self.join_delay = Some(delay);
        self
    }

    /// Build the MockEngine.
    #[must_use]
    pub fn build(self) -> Arc<MockEngine> {
        Arc::new(MockEngine {
            join_failure: self.join_failure,
            track_failure: self.track_failure,
            publish_failure: self.publish_failure,
            join_delay: self.join_delay,
            ..MockEngine::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_join_and_tracks() {
        let engine = MockEngine::builder().build();

        engine
            .join("app", "room1", &SecretString::from("t1"), 1)
            .await
            .unwrap();
        let audio = engine.create_local_track(TrackKind::Audio).await.unwrap();
        let video = engine.create_local_track(TrackKind::Video).await.unwrap();
        engine.publish(&[audio, video]).await.unwrap();

        assert_eq!(engine.join_count(), 1);
        assert_eq!(engine.joins()[0].token, "t1");
        assert_ne!(audio, video);
        assert_eq!(engine.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_failures() {
        let engine = MockEngine::builder()
            .fail_join("invalid token")
            .fail_track(TrackKind::Video)
            .build();

        let join = engine
            .join("app", "room1", &SecretString::from("t1"), 1)
            .await;
        assert!(matches!(join, Err(TransportError::Join(_))));

        assert!(engine.create_local_track(TrackKind::Audio).await.is_ok());
        assert!(engine.create_local_track(TrackKind::Video).await.is_err());
    }

    #[tokio::test]
    async fn test_emit_goes_through_sink() {
        let engine = MockEngine::builder().build();
        let (tx, mut rx) = mpsc::channel(4);
        engine.set_event_sink(Some(tx));
        assert!(engine.has_event_sink());

        engine.emit(EngineEvent::UserJoined { uid: 2 }).await;
        assert_eq!(rx.recv().await, Some(EngineEvent::UserJoined { uid: 2 }));

        engine.set_event_sink(None);
        assert!(!engine.has_event_sink());
    }
}
