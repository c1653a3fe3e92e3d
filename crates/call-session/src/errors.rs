//! Call session error types.
//!
//! Errors from the two leaf components ([`TransportError`], [`SignalingError`])
//! are folded into [`CallError`] at the orchestrator boundary. None of them is
//! ever raised as a panic; transport failures additionally resolve into
//! `ConnectionState::Error` with a retained message.

use std::time::Duration;
use thiserror::Error;

/// Media transport failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Required transport configuration (application id) is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The engine rejected the room join.
    #[error("Join rejected: {0}")]
    Join(String),

    /// A local audio or video track could not be created.
    #[error("Track creation failed: {0}")]
    TrackCreation(String),

    /// Publishing local tracks failed.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// The join did not complete before the deadline.
    #[error("Join timed out after {0:?}")]
    Timeout(Duration),

    /// A join was requested while a room is already joined or joining.
    #[error("Already joined a room")]
    AlreadyJoined,

    /// Any other engine failure (track toggle, connection loss).
    #[error("Engine error: {0}")]
    Engine(String),
}

impl TransportError {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            TransportError::Configuration(_) => "configuration",
            TransportError::Join(_) => "join",
            TransportError::TrackCreation(_) => "track_creation",
            TransportError::Publish(_) => "publish",
            TransportError::Timeout(_) => "timeout",
            TransportError::AlreadyJoined => "already_joined",
            TransportError::Engine(_) => "engine",
        }
    }
}

/// Signaling channel failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalingError {
    /// The channel is not connected or not authenticated.
    #[error("Signaling channel not connected")]
    NotConnected,

    /// The channel refused to emit an event.
    #[error("Emit failed: {0}")]
    Emit(String),

    /// An event could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),
}

/// Orchestrator-level error type.
#[derive(Debug, Error)]
pub enum CallError {
    /// No connected signaling channel; the action was declined.
    #[error("Signaling unavailable")]
    SignalingUnavailable,

    /// A call (or an incoming call) is already held.
    #[error("A call is already in progress")]
    CallInProgress,

    /// The command is not valid in the current call phase.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Media transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Signaling failure.
    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor mailbox closed, reply dropped).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallError {
    /// Whether the user can fix this by acting again (re-initiating, waiting
    /// for the current call to end) as opposed to an environment problem.
    #[must_use]
    pub fn is_user_recoverable(&self) -> bool {
        match self {
            CallError::SignalingUnavailable
            | CallError::CallInProgress
            | CallError::InvalidTransition(_) => true,
            CallError::Transport(e) => !matches!(e, TransportError::Configuration(_)),
            CallError::Signaling(_) | CallError::Config(_) | CallError::Internal(_) => false,
        }
    }

    /// Returns a UI-safe message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            CallError::SignalingUnavailable => "Not connected, please try again".to_string(),
            CallError::CallInProgress => "Another call is already in progress".to_string(),
            CallError::InvalidTransition(_) => "That action is not available right now".to_string(),
            CallError::Transport(TransportError::Timeout(_)) => {
                "Connecting took too long, please try again".to_string()
            }
            CallError::Transport(_) => "Could not connect the call".to_string(),
            CallError::Signaling(_) | CallError::Config(_) | CallError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_kind_labels() {
        assert_eq!(
            TransportError::Configuration("x".to_string()).kind(),
            "configuration"
        );
        assert_eq!(TransportError::Join("x".to_string()).kind(), "join");
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(1)).kind(),
            "timeout"
        );
        assert_eq!(TransportError::AlreadyJoined.kind(), "already_joined");
    }

    #[test]
    fn test_from_leaf_errors() {
        let err: CallError = TransportError::Join("denied".to_string()).into();
        assert!(matches!(err, CallError::Transport(TransportError::Join(_))));

        let err: CallError = SignalingError::NotConnected.into();
        assert!(matches!(
            err,
            CallError::Signaling(SignalingError::NotConnected)
        ));
    }

    #[test]
    fn test_user_recoverable() {
        assert!(CallError::SignalingUnavailable.is_user_recoverable());
        assert!(CallError::CallInProgress.is_user_recoverable());
        assert!(CallError::from(TransportError::Join("busy".to_string())).is_user_recoverable());
        assert!(
            !CallError::from(TransportError::Configuration("no app id".to_string()))
                .is_user_recoverable()
        );
        assert!(!CallError::Internal("closed".to_string()).is_user_recoverable());
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = CallError::Internal("mailbox closed at orchestrator.rs".to_string());
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = CallError::from(TransportError::Join("token abc123 rejected".to_string()));
        assert!(!err.client_message().contains("abc123"));
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", CallError::from(TransportError::AlreadyJoined)),
            "Transport error: Already joined a room"
        );
        assert_eq!(
            format!(
                "{}",
                CallError::from(SignalingError::Emit("socket closed".to_string()))
            ),
            "Signaling error: Emit failed: socket closed"
        );
    }
}
