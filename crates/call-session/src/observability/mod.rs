//! Observability for the call session.
//!
//! # Privacy by Default
//!
//! Room tokens are held in `SecretString` and never appear in spans or log
//! fields. Spans use `#[instrument(skip_all)]` with explicit fields
//! (`call_id`, `channel`, `uid`).
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `call_signaling_events_total` | Counter | `event` | Inbound signaling traffic |
//! | `call_invalid_transitions_total` | Counter | `input` | Commands and events ignored in the current phase |
//! | `call_sessions_ended_total` | Counter | `reason` | How calls end |
//! | `call_transport_errors_total` | Counter | `kind` | Transport failures |
//! | `call_transport_join_duration_seconds` | Histogram | `status` | Room join latency |
//! | `call_remote_participants` | Gauge | none | Remote participants in the room |
//! | `call_orchestrator_mailbox_depth` | Gauge | none | Orchestrator backpressure |
//!
//! The `metrics` facade is used directly; installing a recorder (Prometheus
//! or otherwise) is up to the embedding application.

pub mod metrics;

use crate::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_filter`. Output is JSON when
/// `config.log_json` is set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter.as_str().into());

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json());
    let plain_layer = (!config.log_json).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .try_init()
}
