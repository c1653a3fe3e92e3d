//! Call data model.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Video,
    Audio,
}

impl CallKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CallKind::Video => "video",
            CallKind::Audio => "audio",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public identity of a user taking part in a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            profile_picture: None,
        }
    }

    #[must_use]
    pub fn with_profile_picture(mut self, url: impl Into<String>) -> Self {
        self.profile_picture = Some(url.into());
        self
    }
}

/// One active or pending call.
///
/// `call_id` and `channel_name` stay empty for a locally initiated call until
/// signaling confirms it and hands out a room credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    /// Signaling-assigned call id (empty until assigned).
    pub call_id: String,
    /// Transport room name (empty until assigned).
    pub channel_name: String,
    pub call_kind: CallKind,
    /// The other participant.
    pub other_user: UserIdentity,
    /// Tutoring session this call belongs to, if any.
    pub session_id: Option<String>,
    /// Chat thread the call was started from, if any.
    pub chat_id: Option<String>,
}

impl CallInfo {
    /// Placeholder for an outgoing call before signaling answers.
    #[must_use]
    pub fn placeholder(other_user: UserIdentity, call_kind: CallKind) -> Self {
        Self {
            call_id: String::new(),
            channel_name: String::new(),
            call_kind,
            other_user,
            session_id: None,
            chat_id: None,
        }
    }

    /// Whether signaling has assigned a call id yet.
    #[must_use]
    pub fn has_call_id(&self) -> bool {
        !self.call_id.is_empty()
    }

    /// Whether an event for `call_id` refers to this call. A placeholder
    /// without an id matches any call id.
    #[must_use]
    pub fn matches(&self, call_id: &str) -> bool {
        !self.has_call_id() || self.call_id == call_id
    }
}

/// A call offered to the local user and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCallInfo {
    pub call: CallInfo,
    /// Who initiated the call.
    pub caller: UserIdentity,
}

impl IncomingCallInfo {
    #[must_use]
    pub fn new(
        call_id: impl Into<String>,
        channel_name: impl Into<String>,
        call_kind: CallKind,
        caller: UserIdentity,
    ) -> Self {
        Self {
            call: CallInfo {
                call_id: call_id.into(),
                channel_name: channel_name.into(),
                call_kind,
                other_user: caller.clone(),
                session_id: None,
                chat_id: None,
            },
            caller,
        }
    }

    #[must_use]
    pub fn call_id(&self) -> &str {
        &self.call.call_id
    }

    /// The call as seen once accepted: the caller becomes the other user.
    #[must_use]
    pub fn into_accepted(self) -> CallInfo {
        CallInfo {
            other_user: self.caller,
            ..self.call
        }
    }
}

/// Which side started a call that is waiting for its room credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Per-call credential for joining a transport room.
#[derive(Debug, Clone)]
pub struct RoomCredential {
    pub channel_name: String,
    pub token: SecretString,
    /// Media uid assigned to the local participant.
    pub uid: u32,
}
