//! Actor implementation of the call session orchestrator.
//!
//! ```text
//! CallOrchestratorHandle (cloneable, one per UI consumer)
//! └── CallOrchestrator (one per logged-in user)
//!     ├── owns CallPhase and MediaTransportBinding
//!     ├── inbound signaling events (Subscription sink)
//!     └── engine room events (binding event sink)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single owner**: all call state lives in one task; commands, signaling
//!   events and engine events are serialized through one `tokio::select!` loop
//! - **Explicit dependencies**: the signaling channel, media engine and local
//!   identity are passed to `spawn`
//! - **Deterministic teardown**: cancellation disposes the signaling
//!   subscription and always leaves the transport room
//! - **Observable state**: a `tokio::sync::watch` channel carries the latest
//!   `CallSnapshot`
//!
//! # Modules
//!
//! - [`orchestrator`] - `CallOrchestrator` actor and its handle
//! - [`messages`] - Commands and the published snapshot
//! - [`metrics`] - Mailbox monitoring

pub mod messages;
pub mod metrics;
pub mod orchestrator;

pub use messages::*;
pub use metrics::{MailboxLevel, MailboxMonitor};
pub use orchestrator::{CallOrchestrator, CallOrchestratorHandle, OrchestratorDeps};
