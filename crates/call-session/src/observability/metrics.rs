//! Metrics definitions for the call session.
//!
//! All metrics follow Prometheus naming conventions:
//! - `call_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by code:
//! - `event`: inbound signaling event names (11 values)
//! - `input`: state machine input names (13 values)
//! - `reason`: session end reasons (8 values)
//! - `kind`: transport error kinds (7 values)
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Count an inbound signaling event.
///
/// Metric: `call_signaling_events_total`
/// Labels: `event`
pub fn record_signaling_event(event: &'static str) {
    counter!("call_signaling_events_total", "event" => event).increment(1);
}

/// Count a command or event that was not valid in the current phase.
///
/// Metric: `call_invalid_transitions_total`
/// Labels: `input`
pub fn record_invalid_transition(input: &'static str) {
    counter!("call_invalid_transitions_total", "input" => input).increment(1);
}

/// Count a call returning to idle.
///
/// Metric: `call_sessions_ended_total`
/// Labels: `reason` (local_end, remote_end, rejected, drained, transport_failure,
/// timeout, shutdown, other)
pub fn record_session_ended(reason: &'static str) {
    counter!("call_sessions_ended_total", "reason" => reason).increment(1);
}

/// Count a transport failure.
///
/// Metric: `call_transport_errors_total`
/// Labels: `kind` (see `TransportError::kind`)
pub fn record_transport_error(kind: &'static str) {
    counter!("call_transport_errors_total", "kind" => kind).increment(1);
}

/// Record how long a room join took, including track setup and publish.
///
/// Metric: `call_transport_join_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_transport_join(duration: Duration, status: &'static str) {
    histogram!("call_transport_join_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

/// Set the number of remote participants in the joined room.
///
/// Metric: `call_remote_participants`
pub fn set_remote_participants(count: usize) {
    // usize to f64 conversion is safe for realistic room sizes
    #[allow(clippy::cast_precision_loss)]
    gauge!("call_remote_participants").set(count as f64);
}

/// Set the orchestrator mailbox depth.
///
/// Metric: `call_orchestrator_mailbox_depth`
pub fn set_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("call_orchestrator_mailbox_depth").set(depth as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    // Without a recorder the facade is a no-op; these must never panic.
    #[test]
    fn test_recording_without_recorder() {
        record_signaling_event("CALL_ENDED");
        record_invalid_transition("accept_requested");
        record_session_ended("local_end");
        record_transport_error("join");
        record_transport_join(Duration::from_millis(250), "success");
        set_remote_participants(2);
        set_mailbox_depth(0);
    }

    #[test]
    fn test_metric_names_and_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_signaling_event("INCOMING_CALL");
            record_signaling_event("INCOMING_CALL");
            record_invalid_transition("end_requested");
            record_session_ended("drained");
            record_transport_error("timeout");
            record_transport_join(Duration::from_millis(100), "error");
            set_remote_participants(1);
            set_mailbox_depth(3);
        });

        let metrics = snapshotter.snapshot().into_vec();
        let find = |name: &str| {
            metrics
                .iter()
                .find(|(key, _, _, _)| key.key().name() == name)
                .map(|(key, _, _, value)| (key, value))
        };

        let (key, value) = find("call_signaling_events_total").unwrap();
        assert_eq!(key.kind(), MetricKind::Counter);
        assert!(key
            .key()
            .labels()
            .any(|l| l.key() == "event" && l.value() == "INCOMING_CALL"));
        assert_eq!(value, &DebugValue::Counter(2));

        assert!(find("call_invalid_transitions_total").is_some());
        assert!(find("call_sessions_ended_total").is_some());
        assert!(find("call_transport_errors_total").is_some());

        let (key, _) = find("call_transport_join_duration_seconds").unwrap();
        assert_eq!(key.kind(), MetricKind::Histogram);

        let (key, _) = find("call_remote_participants").unwrap();
        assert_eq!(key.kind(), MetricKind::Gauge);
        assert!(find("call_orchestrator_mailbox_depth").is_some());
    }
}
