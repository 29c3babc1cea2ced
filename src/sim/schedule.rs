//! Pending disturbance schedule.

use super::command::Disturbance;

/// Time-ordered queue of pending disturbances.
///
/// Events with equal times fire in registration order.
#[derive(Debug, Default, Clone)]
pub struct EventQueue {
    /// Pending events sorted by `(time, seq)`.
    pending: Vec<(f64, u64, Disturbance)>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event, keeping the queue sorted.
    pub fn push(&mut self, event: Disturbance) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let idx = self
            .pending
            .partition_point(|(t, s, _)| (*t, *s) <= (event.time, seq));
        self.pending.insert(idx, (event.time, seq, event));
    }

    /// Time of the earliest pending event.
    pub fn next_time(&self) -> Option<f64> {
        self.pending.first().map(|(t, _, _)| *t)
    }

    /// Removes and returns every event with `time <= now`, in firing order.
    pub fn pop_due(&mut self, now: f64) -> Vec<Disturbance> {
        let split = self.pending.partition_point(|(t, _, _)| *t <= now);
        self.pending.drain(..split).map(|(_, _, e)| e).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
