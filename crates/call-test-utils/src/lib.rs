//! # Call Test Utilities
//!
//! Shared test utilities for the call session orchestrator.
//!
//! This crate provides mock implementations of the two external seams and
//! fixtures for driving full call flows without a real media SDK or
//! signaling server.
//!
//! ## Modules
//!
//! - `mock_engine` - Scriptable `MediaEngine` that records every call
//! - `mock_signaling` - In-memory `SignalingChannel` with event injection
//! - `fixtures` - Identities, signaling events and an orchestrator harness
//!
//! ## Usage
//!
//! ```rust,ignore
//! use call_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let harness = TestHarness::spawn(MockEngine::builder().build());
//!
//!     harness.handle.initiate_call("student-7", CallKind::Video, None, None).await.unwrap();
//!     harness.signaling.inject(call_initiated("c1", "room1", "t1", 1)).await;
//!
//!     let snapshot = harness.wait_for(|s| s.is_in_call()).await;
//!     assert_eq!(harness.engine.joins()[0].channel, "room1");
//! }
//! ```

pub mod fixtures;
pub mod mock_engine;
pub mod mock_signaling;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_engine::*;
pub use mock_signaling::*;
