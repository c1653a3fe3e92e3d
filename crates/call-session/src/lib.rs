//! Call Session Library
//!
//! Orchestrates one-to-one audio/video calls between a tutor and a student:
//!
//! - Signaling contract (`CALL_*` events) over an application-owned channel
//! - Media transport binding over an application-owned real-time engine
//! - A call session orchestrator that reconciles the two into one call state
//!
//! # Architecture
//!
//! ```text
//! UI ──commands──> CallOrchestratorHandle ──mpsc──> CallOrchestrator
//!  ^                                                  │  ├── CallPhase (state machine)
//!  └──────────── watch<CallSnapshot> <────────────────┘  └── MediaTransportBinding
//!                                                              └── dyn MediaEngine
//! SignalingChannel ──InboundEvent──> CallOrchestrator ──OutboundEvent──> SignalingChannel
//! ```
//!
//! # Key Design Decisions
//!
//! - **Explicit state machine**: every command and event goes through
//!   `CallPhase::apply`; invalid transitions are logged and ignored
//! - **One call at a time**: a second call attempt fails with
//!   `CallError::CallInProgress`; an incoming call while busy is declined
//! - **Join after credential**: accepting a call only emits CALL_ACCEPT; the
//!   room is joined when signaling returns the credential
//! - **No panics**: failures resolve into an error state plus message
//!
//! # Modules
//!
//! - [`actors`] - Orchestrator actor, handle and snapshot
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types
//! - [`machine`] - Call phase state machine
//! - [`models`] - Call data model
//! - [`observability`] - Tracing setup and metrics
//! - [`signaling`] - Signaling channel contract and event codec
//! - [`transport`] - Media engine seam and transport binding

pub mod actors;
pub mod config;
pub mod errors;
pub mod machine;
pub mod models;
pub mod observability;
pub mod signaling;
pub mod transport;

pub use actors::{CallOrchestrator, CallOrchestratorHandle, CallSnapshot, OrchestratorDeps};
pub use config::Config;
pub use errors::{CallError, SignalingError, TransportError};
