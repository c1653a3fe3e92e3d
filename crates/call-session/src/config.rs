//! Call session configuration.
//!
//! Configuration is loaded from environment variables. Nothing here is
//! validated against the media engine until a room is actually joined: a
//! missing application id only fails at join time.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default deadline for a single transport join, in seconds.
pub const DEFAULT_JOIN_TIMEOUT_SECONDS: u64 = 30;

/// Default orchestrator mailbox capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Default buffer for inbound signaling and engine events.
pub const DEFAULT_EVENT_BUFFER: usize = 128;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "call_session=info";

/// Call session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Media engine application id. `None` makes every join fail with a
    /// configuration error.
    pub transport_app_id: Option<String>,

    /// Deadline for one transport join (default: 30s).
    pub join_timeout: Duration,

    /// Optional deadline for calls awaiting a credential or a local
    /// accept/reject decision. `None` keeps pending calls until a terminal
    /// signal or a local action.
    pub pending_call_timeout: Option<Duration>,

    /// Orchestrator mailbox capacity (default: 64).
    pub mailbox_capacity: usize,

    /// Buffer for inbound signaling and engine events (default: 128).
    pub event_buffer: usize,

    /// Tracing env-filter directive.
    pub log_filter: String,

    /// Emit JSON-formatted logs.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport_app_id: None,
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECONDS),
            pending_call_timeout: None,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            event_buffer: DEFAULT_EVENT_BUFFER,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let transport_app_id = vars
            .get("CALL_TRANSPORT_APP_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let join_timeout_seconds: u64 =
            parse_var(vars, "CALL_JOIN_TIMEOUT_SECONDS")?.unwrap_or(DEFAULT_JOIN_TIMEOUT_SECONDS);
        if join_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "CALL_JOIN_TIMEOUT_SECONDS must be greater than zero".to_string(),
            ));
        }

        // 0 disables the deadline, same as leaving it unset
        let pending_call_timeout = parse_var::<u64>(vars, "CALL_PENDING_TIMEOUT_SECONDS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let mailbox_capacity: usize =
            parse_var(vars, "CALL_MAILBOX_CAPACITY")?.unwrap_or(DEFAULT_MAILBOX_CAPACITY);
        if mailbox_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CALL_MAILBOX_CAPACITY must be greater than zero".to_string(),
            ));
        }

        let event_buffer: usize =
            parse_var(vars, "CALL_SIGNALING_BUFFER")?.unwrap_or(DEFAULT_EVENT_BUFFER);
        if event_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "CALL_SIGNALING_BUFFER must be greater than zero".to_string(),
            ));
        }

        let log_filter = vars
            .get("CALL_LOG_FILTER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_json = parse_var(vars, "CALL_LOG_JSON")?.unwrap_or(false);

        Ok(Config {
            transport_app_id,
            join_timeout: Duration::from_secs(join_timeout_seconds),
            pending_call_timeout,
            mailbox_capacity,
            event_buffer,
            log_filter,
            log_json,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    match vars.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw}"))),
    }
}
