//! # Scheduler lifecycle events.
//!
//! [`EventKind`] classifies what the scheduler is doing; [`Event`] carries
//! the kind plus optional metadata (owning sub-producer id, error text).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! observed out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A worker task was scheduled against a producer.
    ///
    /// Sets:
    /// - `sub`: owning sub-producer id, or `None` for the root
    /// - `seq`: global sequence
    TaskScheduled,

    /// A plain value was handed to the consumer.
    ItemDelivered,

    /// A transform returned a nested sequence; a sub-producer went live.
    ///
    /// Sets:
    /// - `sub`: the new sub-producer id
    SubDiscovered,

    /// A sub-producer signalled exhaustion or failure and was retired.
    ///
    /// Sets:
    /// - `sub`: the retired sub-producer id
    SubRetired,

    /// The root producer signalled exhaustion; no further root tasks.
    RootExhausted,

    /// The first error was latched; later errors will be discarded.
    ///
    /// Sets:
    /// - `error`: the latched error message
    ErrorLatched,

    /// A producer's `close()` failed; the failure was swallowed.
    ///
    /// Sets:
    /// - `error`: the swallowed close error message
    CloseFailed,

    /// Shutdown began (exhaustion, cancellation, or failure).
    ShutdownStarted,

    /// Every tracked producer was closed; the scheduler is terminal.
    Terminated,
}

/// A single scheduler event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Global monotonic sequence number.
    pub seq: u64,
    /// Sub-producer id this event refers to (`None` = root or not applicable).
    pub sub: Option<u64>,
    /// Error message, for failure-flavored kinds.
    pub error: Option<String>,
}

impl Event {
    /// Creates an event of the given kind with a fresh sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            sub: None,
            error: None,
        }
    }

    /// Attaches a sub-producer id.
    pub fn with_sub(mut self, sub: u64) -> Self {
        self.sub = Some(sub);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let first = Event::new(EventKind::TaskScheduled);
        let second = Event::new(EventKind::ItemDelivered);
        assert!(second.seq > first.seq);
    }

    #[test]
    fn test_builders_set_metadata() {
        let ev = Event::new(EventKind::SubRetired).with_sub(3).with_error("gone");
        assert_eq!(ev.kind, EventKind::SubRetired);
        assert_eq!(ev.sub, Some(3));
        assert_eq!(ev.error.as_deref(), Some("gone"));
    }
}
