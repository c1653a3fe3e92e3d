//! In-memory signaling channel for orchestrator testing.
//!
//! Records every emitted event and delivers injected inbound events to all
//! registered sinks, the way the real channel fans out to its handlers.
//!
//! # Example
//!
//! ```rust,ignore
//! use call_test_utils::MockSignaling;
//!
//! let signaling = MockSignaling::connected();
//! signaling.inject_raw(r#"{"event":"CALL_CANCELLED","data":{"callId":"c1"}}"#).await;
//! assert_eq!(signaling.emitted_names(), vec!["CALL_INITIATE"]);
//! ```

use call_session::errors::SignalingError;
use call_session::signaling::{
    decode_inbound, InboundEvent, OutboundEvent, SignalingChannel, SubscriptionId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Mock signaling channel.
#[derive(Debug, Default)]
pub struct MockSignaling {
    connected: AtomicBool,
    fail_emit: AtomicBool,
    emitted: Mutex<Vec<OutboundEvent>>,
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::Sender<InboundEvent>>>,
}

impl MockSignaling {
    /// A connected, authenticated channel.
    #[must_use]
    pub fn connected() -> Arc<Self> {
        let signaling = Self::default();
        signaling.connected.store(true, Ordering::SeqCst);
        Arc::new(signaling)
    }

    /// A channel that is not connected.
    #[must_use]
    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every emit fail (the event is not recorded).
    pub fn set_emit_failure(&self, fail: bool) {
        self.fail_emit.store(fail, Ordering::SeqCst);
    }

    /// Events emitted so far, in order.
    #[must_use]
    pub fn emitted(&self) -> Vec<OutboundEvent> {
        self.emitted.lock().unwrap().clone()
    }

    /// Wire names of events emitted so far, in order.
    #[must_use]
    pub fn emitted_names(&self) -> Vec<&'static str> {
        self.emitted().iter().map(OutboundEvent::name).collect()
    }

    pub fn clear_emitted(&self) {
        self.emitted.lock().unwrap().clear();
    }

    /// Number of registered inbound sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Deliver an inbound event to every registered sink.
    pub async fn inject(&self, event: InboundEvent) {
        let sinks: Vec<_> = self.subscribers.lock().unwrap().values().cloned().collect();
        for sink in sinks {
            let _ = sink.send(event.clone()).await;
        }
    }

    /// Decode a wire-format event and deliver it.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is not a valid inbound event.
    pub async fn inject_raw(&self, raw: &str) {
        let event = decode_inbound(raw).expect("invalid inbound event");
        self.inject(event).await;
    }

    /// Wait until an event named `name` has been emitted `count` times.
    ///
    /// # Panics
    ///
    /// Panics if that does not happen within five seconds.
    pub async fn wait_for_emitted(&self, name: &str, count: usize) {
        let wait = async {
            loop {
                let seen = self.emitted_names().iter().filter(|n| **n == name).count();
                if seen >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| {
                panic!(
                    "timed out waiting for {count}x {name}, emitted: {:?}",
                    self.emitted_names()
                )
            });
    }
}

impl SignalingChannel for MockSignaling {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OutboundEvent) -> Result<(), SignalingError> {
        if !self.is_connected() {
            return Err(SignalingError::NotConnected);
        }
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(SignalingError::Emit("socket closed".to_string()));
        }
        self.emitted.lock().unwrap().push(event);
        Ok(())
    }

    fn subscribe(&self, sink: mpsc::Sender<InboundEvent>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscribers.lock().unwrap().insert(id, sink);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inject_reaches_subscribers_until_unsubscribed() {
        let signaling = MockSignaling::connected();
        let (tx, mut rx) = mpsc::channel(4);
        let id = signaling.subscribe(tx);

        signaling
            .inject_raw(r#"{"event":"CALL_CANCELLED","data":{"callId":"c1"}}"#)
            .await;
        assert_eq!(rx.recv().await.unwrap().name(), "CALL_CANCELLED");

        signaling.unsubscribe(id);
        assert_eq!(signaling.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_requires_connection() {
        let signaling = MockSignaling::disconnected();
        let event = OutboundEvent::CallEnd {
            call_id: "c1".to_string(),
        };

        assert_eq!(
            signaling.emit(event.clone()),
            Err(SignalingError::NotConnected)
        );

        signaling.set_connected(true);
        signaling.emit(event).unwrap();
        assert_eq!(signaling.emitted_names(), vec!["CALL_END"]);
    }
}
