//! Signaling channel contract.
//!
//! The channel itself (transport, reconnection, auth refresh) belongs to the
//! embedding application. The orchestrator only needs to emit events and to
//! register a sink for inbound events, and it registers through a
//! [`Subscription`] guard so that teardown is deterministic rather than left
//! to whoever drops the channel last.

pub mod events;

pub use events::{decode_inbound, encode_outbound, InboundEvent, OutboundEvent};

use crate::errors::SignalingError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identifier of a registered inbound-event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An authenticated, bidirectional signaling connection shared by the whole
/// session (one per logged-in user).
pub trait SignalingChannel: Send + Sync {
    /// Whether the channel is currently connected and authenticated.
    fn is_connected(&self) -> bool;

    /// Emit an event. Fire-and-forget: responses arrive later as separate
    /// inbound events.
    fn emit(&self, event: OutboundEvent) -> Result<(), SignalingError>;

    /// Register a sink for inbound call events.
    fn subscribe(&self, sink: mpsc::Sender<InboundEvent>) -> SubscriptionId;

    /// Remove a previously registered sink. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Registration of an inbound-event sink, removed on [`Subscription::dispose`]
/// or on drop, whichever comes first.
pub struct Subscription {
    channel: Arc<dyn SignalingChannel>,
    id: SubscriptionId,
    disposed: bool,
}

impl Subscription {
    /// Register `sink` on `channel`.
    pub fn register(channel: Arc<dyn SignalingChannel>, sink: mpsc::Sender<InboundEvent>) -> Self {
        let id = channel.subscribe(sink);
        debug!(target: "call.signaling", subscription_id = %id, "Signaling handlers registered");
        Self {
            channel,
            id,
            disposed: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Unregister the sink. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.channel.unsubscribe(self.id);
        self.disposed = true;
        debug!(target: "call.signaling", subscription_id = %self.id, "Signaling handlers removed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
