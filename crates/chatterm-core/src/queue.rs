//! FIFO holding area for messages that arrive while the agent is busy.
//!
//! Enqueueing always succeeds (memory-bound only). Release is strictly
//! FIFO, one entry per call, and only after the idle state has persisted
//! for a settle delay - releasing the instant busy flips to false would
//! race the detector's recency window.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One queued message.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub text: String,
    pub enqueued_at: DateTime<Utc>,
}

/// In-memory FIFO with settle-delayed release.
pub struct TaskQueue {
    entries: VecDeque<QueueEntry>,
    settle: Duration,
    /// When the busy signal was last observed false, continuously.
    idle_since: Option<Instant>,
}

impl TaskQueue {
    pub fn new(settle: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            settle,
            idle_since: None,
        }
    }

    /// Append a message; returns its 1-based queue position.
    pub fn enqueue(&mut self, text: String) -> usize {
        self.entries.push_back(QueueEntry {
            text,
            enqueued_at: Utc::now(),
        });
        self.entries.len()
    }

    /// Release the head entry if idle has persisted for the settle delay.
    ///
    /// Any busy observation resets the settle clock. Called once per
    /// watcher tick, so at most one entry is released per tick.
    pub fn try_drain(&mut self, busy: bool, now: Instant) -> Option<String> {
        if busy {
            self.idle_since = None;
            return None;
        }
        let idle_since = *self.idle_since.get_or_insert(now);
        if now.duration_since(idle_since) < self.settle {
            return None;
        }
        self.entries.pop_front().map(|entry| entry.text)
    }

    /// Discard everything; returns how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        self.idle_since = None;
        discarded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_secs(2);

    fn queue() -> TaskQueue {
        TaskQueue::new(SETTLE)
    }

    #[test]
    fn enqueue_returns_positions() {
        let mut q = queue();
        assert_eq!(q.enqueue("a".to_string()), 1);
        assert_eq!(q.enqueue("b".to_string()), 2);
        assert_eq!(q.enqueue("c".to_string()), 3);
    }

    #[test]
    fn nothing_drains_while_busy() {
        let mut q = queue();
        q.enqueue("a".to_string());
        let now = Instant::now();
        for i in 0..10 {
            assert_eq!(q.try_drain(true, now + Duration::from_secs(i)), None);
        }
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn drains_in_fifo_order_after_settle() {
        let mut q = queue();
        q.enqueue("A".to_string());
        q.enqueue("B".to_string());

        let t0 = Instant::now();
        // Busy: held.
        assert_eq!(q.try_drain(true, t0), None);
        // Idle, but the settle delay has not elapsed yet.
        assert_eq!(q.try_drain(false, t0 + Duration::from_secs(1)), None);
        // Settled: one entry per tick, in order.
        assert_eq!(
            q.try_drain(false, t0 + Duration::from_secs(4)),
            Some("A".to_string())
        );
        assert_eq!(
            q.try_drain(false, t0 + Duration::from_secs(5)),
            Some("B".to_string())
        );
        assert_eq!(q.try_drain(false, t0 + Duration::from_secs(6)), None);
    }

    #[test]
    fn busy_observation_resets_settle_clock() {
        let mut q = queue();
        q.enqueue("A".to_string());

        let t0 = Instant::now();
        assert_eq!(q.try_drain(false, t0), None);
        // Busy again before settling: the idle run starts over.
        assert_eq!(q.try_drain(true, t0 + Duration::from_secs(1)), None);
        assert_eq!(q.try_drain(false, t0 + Duration::from_secs(2)), None);
        assert_eq!(q.try_drain(false, t0 + Duration::from_secs(3)), None);
        assert_eq!(
            q.try_drain(false, t0 + Duration::from_secs(5)),
            Some("A".to_string())
        );
    }

    #[test]
    fn empty_queue_drains_nothing() {
        let mut q = queue();
        let t0 = Instant::now();
        assert_eq!(q.try_drain(false, t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn clear_reports_discarded_count() {
        let mut q = queue();
        q.enqueue("a".to_string());
        q.enqueue("b".to_string());
        assert_eq!(q.clear(), 2);
        assert!(q.is_empty());
        assert_eq!(q.clear(), 0);
    }

    #[test]
    fn order_is_preserved_end_to_end() {
        let mut q = queue();
        let messages = ["one", "two", "three", "four"];
        for m in messages {
            q.enqueue(m.to_string());
        }

        let t0 = Instant::now();
        let mut drained = Vec::new();
        let mut now = t0 + Duration::from_secs(3);
        q.try_drain(false, t0); // start the idle run
        while let Some(text) = q.try_drain(false, now) {
            drained.push(text);
            now += Duration::from_secs(1);
        }
        assert_eq!(drained, messages);
    }
}
