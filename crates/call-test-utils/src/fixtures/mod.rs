//! Test fixtures: identities, signaling events and an orchestrator harness.

use crate::mock_engine::MockEngine;
use crate::mock_signaling::MockSignaling;
use call_session::actors::{
    CallOrchestrator, CallOrchestratorHandle, CallSnapshot, OrchestratorDeps,
};
use call_session::config::Config;
use call_session::models::{CallKind, UserIdentity};
use call_session::signaling::{InboundEvent, SignalingChannel};
use call_session::transport::MediaEngine;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Application id used by [`test_config`].
pub const TEST_APP_ID: &str = "app-test";

/// The logged-in user in harness tests.
#[must_use]
pub fn tutor() -> UserIdentity {
    UserIdentity::new("tutor-1", "Ms. Tutor")
}

/// The other party in harness tests.
#[must_use]
pub fn student() -> UserIdentity {
    UserIdentity::new("student-7", "Sam Student")
}

/// Config with a transport application id and otherwise defaults.
#[must_use]
pub fn test_config() -> Config {
    Config {
        transport_app_id: Some(TEST_APP_ID.to_string()),
        ..Config::default()
    }
}

#[must_use]
pub fn call_initiated(call_id: &str, channel: &str, token: &str, uid: u32) -> InboundEvent {
    InboundEvent::CallInitiated {
        call_id: call_id.to_string(),
        channel_name: channel.to_string(),
        token: SecretString::from(token),
        uid,
        call_type: CallKind::Video,
    }
}

#[must_use]
pub fn incoming_call(call_id: &str, channel: &str, caller: UserIdentity) -> InboundEvent {
    InboundEvent::IncomingCall {
        call_id: call_id.to_string(),
        channel_name: channel.to_string(),
        call_type: CallKind::Video,
        caller,
        session_id: None,
    }
}

#[must_use]
pub fn call_accepted(call_id: &str, channel: &str, token: &str, uid: u32) -> InboundEvent {
    InboundEvent::CallAccepted {
        call_id: call_id.to_string(),
        channel_name: channel.to_string(),
        token: SecretString::from(token),
        uid,
    }
}

#[must_use]
pub fn call_ended(call_id: &str) -> InboundEvent {
    InboundEvent::CallEnded {
        call_id: call_id.to_string(),
        duration: Some(60),
    }
}

#[must_use]
pub fn call_cancelled(call_id: &str) -> InboundEvent {
    InboundEvent::CallCancelled {
        call_id: call_id.to_string(),
    }
}

#[must_use]
pub fn call_rejected(call_id: &str) -> InboundEvent {
    InboundEvent::CallRejected {
        call_id: call_id.to_string(),
    }
}

#[must_use]
pub fn participant_left(call_id: &str, active_participants: u32) -> InboundEvent {
    InboundEvent::CallParticipantLeft {
        call_id: call_id.to_string(),
        user_id: student().id,
        active_participants,
    }
}

/// A running orchestrator wired to mocks.
pub struct TestHarness {
    pub handle: CallOrchestratorHandle,
    pub task: JoinHandle<()>,
    pub signaling: Arc<MockSignaling>,
    pub engine: Arc<MockEngine>,
    pub cancel_token: CancellationToken,
}

impl TestHarness {
    /// Spawn with [`test_config`] and a connected signaling channel.
    #[must_use]
    pub fn spawn(engine: Arc<MockEngine>) -> Self {
        Self::spawn_with(engine, MockSignaling::connected(), &test_config())
    }

    #[must_use]
    pub fn spawn_with(
        engine: Arc<MockEngine>,
        signaling: Arc<MockSignaling>,
        config: &Config,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let deps = OrchestratorDeps {
            signaling: Arc::clone(&signaling) as Arc<dyn SignalingChannel>,
            engine: Arc::clone(&engine) as Arc<dyn MediaEngine>,
            local_user: tutor(),
        };
        let (handle, task) = CallOrchestrator::spawn(deps, config, cancel_token.clone());
        Self {
            handle,
            task,
            signaling,
            engine,
            cancel_token,
        }
    }

    /// Wait until the published snapshot satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// Panics if that does not happen within five seconds.
    pub async fn wait_for(&self, predicate: impl FnMut(&CallSnapshot) -> bool) -> CallSnapshot {
        let mut rx = self.handle.subscribe();
        let result = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate)).await;
        match result {
            Ok(Ok(snapshot)) => snapshot.clone(),
            Ok(Err(_)) => panic!("orchestrator stopped while waiting for snapshot"),
            Err(_) => panic!(
                "timed out waiting for snapshot, last: {:?}",
                self.handle.snapshot()
            ),
        }
    }

    /// Initiate a call to [`student`] and deliver its credential (`c1` in
    /// `room1`) without waiting for the join.
    pub async fn start_outgoing(&self) {
        self.handle
            .initiate_call(student().id, CallKind::Video, None, None)
            .await
            .unwrap();
        self.signaling
            .inject(call_initiated("c1", "room1", "t1", 1))
            .await;
    }

    /// Drive an outgoing call to the connected state as `c1` in `room1`.
    pub async fn connect_outgoing(&self) -> CallSnapshot {
        self.start_outgoing().await;
        self.wait_for(CallSnapshot::is_in_call).await
    }

    /// Cancel the orchestrator and wait for its teardown.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        self.task.await.unwrap();
    }
}
