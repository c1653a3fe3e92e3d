//! Orchestrator mailbox monitoring.
//!
//! Thresholds scale with the configured mailbox capacity:
//!
//! | Level    | Depth                    |
//! |----------|--------------------------|
//! | Normal   | <= half of capacity      |
//! | Warning  | up to 3/4 of capacity    |
//! | Critical | above 3/4 of capacity    |
//!
//! Handles count a message when they send it and the actor counts it off
//! once it has been handled, so the depth includes the message in progress.
//! A call session normally sees a handful of commands per minute, so any
//! sustained depth points at a stalled engine call inside the actor.

use crate::observability::metrics;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks queue depth of the orchestrator mailbox and publishes it as a
/// gauge.
#[derive(Debug)]
pub struct MailboxMonitor {
    normal_threshold: usize,
    warning_threshold: usize,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a monitor for a mailbox of `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let normal_threshold = (capacity / 2).max(1);
        let warning_threshold = (capacity.saturating_mul(3) / 4).max(normal_threshold);
        Self {
            normal_threshold,
            warning_threshold,
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);
        metrics::set_mailbox_depth(new_depth);

        match self.level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "call.actor.mailbox",
                    depth = new_depth,
                    threshold = self.warning_threshold,
                    "Mailbox depth critical"
                );
            }
            // Log once when crossing into the warning band
            MailboxLevel::Warning if new_depth == self.normal_threshold + 1 => {
                debug!(
                    target: "call.actor.mailbox",
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message being taken off the mailbox.
    pub fn record_dequeue(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        metrics::set_mailbox_depth(previous.saturating_sub(1));
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.warning_threshold {
            MailboxLevel::Critical
        } else if depth > self.normal_threshold {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}
