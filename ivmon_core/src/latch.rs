//! Lock-free edge latch shared between the sensor driver and the session.
//!
//! The driver side (interrupt context or a driver thread) records the
//! timestamp of the most recent raw edge per channel; the session reads
//! and clears each latch exactly once per tick. One reader, one narrow
//! idempotent writer: a later edge simply overwrites an unread earlier
//! one, so no pulse is ever double-processed.

use ivmon_traits::{Channel, EdgeSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// Timestamps are stored as ms+1 so that 0 means "no unread edge".
const EMPTY: u64 = 0;

#[derive(Debug)]
struct Shared {
    edges: [AtomicU64; 3],
    fault: Mutex<Option<String>>,
}

/// Driver-side handle; cloneable so each sensor callback can own one.
#[derive(Debug, Clone)]
pub struct EdgePublisher {
    shared: Arc<Shared>,
}

impl EdgePublisher {
    /// Record a raw edge on `channel` at `ts_ms` (session clock).
    pub fn record(&self, channel: Channel, ts_ms: u64) {
        self.shared.edges[channel.index()].store(ts_ms.saturating_add(1), Ordering::Release);
    }

    /// Report a sensor/driver fault. The session latches it as the
    /// highest-priority alarm until the operator terminates.
    pub fn raise_fault(&self, message: impl Into<String>) {
        if let Ok(mut guard) = self.shared.fault.lock() {
            guard.get_or_insert_with(|| message.into());
        }
    }
}

/// Session-side consumer implementing [`EdgeSource`].
#[derive(Debug)]
pub struct EdgeLatch {
    shared: Arc<Shared>,
}

impl EdgeLatch {
    pub fn new() -> (Self, EdgePublisher) {
        let shared = Arc::new(Shared {
            edges: [AtomicU64::new(EMPTY), AtomicU64::new(EMPTY), AtomicU64::new(EMPTY)],
            fault: Mutex::new(None),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            EdgePublisher { shared },
        )
    }
}

impl EdgeSource for EdgeLatch {
    fn take_edge(&mut self, channel: Channel) -> Option<u64> {
        match self.shared.edges[channel.index()].swap(EMPTY, Ordering::Acquire) {
            EMPTY => None,
            stored => Some(stored - 1),
        }
    }

    fn take_fault(&mut self) -> Option<String> {
        self.shared.fault.lock().ok().and_then(|mut g| g.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_is_consumed_once() {
        let (mut latch, publisher) = EdgeLatch::new();
        publisher.record(Channel::Drop, 1234);
        assert_eq!(latch.take_edge(Channel::Drop), Some(1234));
        assert_eq!(latch.take_edge(Channel::Drop), None);
    }

    #[test]
    fn later_edge_overwrites_unread_one() {
        let (mut latch, publisher) = EdgeLatch::new();
        publisher.record(Channel::BubbleIr, 100);
        publisher.record(Channel::BubbleIr, 250);
        assert_eq!(latch.take_edge(Channel::BubbleIr), Some(250));
    }

    #[test]
    fn channels_do_not_interfere() {
        let (mut latch, publisher) = EdgeLatch::new();
        publisher.record(Channel::Drop, 10);
        publisher.record(Channel::BubbleSlot, 20);
        assert_eq!(latch.take_edge(Channel::BubbleIr), None);
        assert_eq!(latch.take_edge(Channel::Drop), Some(10));
        assert_eq!(latch.take_edge(Channel::BubbleSlot), Some(20));
    }

    #[test]
    fn timestamp_zero_is_representable() {
        let (mut latch, publisher) = EdgeLatch::new();
        publisher.record(Channel::Drop, 0);
        assert_eq!(latch.take_edge(Channel::Drop), Some(0));
    }

    #[test]
    fn first_fault_wins_and_is_taken_once() {
        let (mut latch, publisher) = EdgeLatch::new();
        publisher.raise_fault("drop sensor silent");
        publisher.raise_fault("second report");
        assert_eq!(latch.take_fault().as_deref(), Some("drop sensor silent"));
        assert_eq!(latch.take_fault(), None);
    }
}
