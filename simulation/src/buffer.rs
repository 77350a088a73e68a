//! Delayed send buffer
//!
//! Outgoing messages wait here until their scheduled round. The buffer also
//! keeps links FIFO: a message is never due before an earlier message on
//! the same link, whatever delay it drew.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use ghs_core::{Envelope, NodeId};

/// Min-heap of scheduled envelopes for one sender
#[derive(Debug, Default)]
pub struct SendBuffer {
    pending: BinaryHeap<Reverse<Envelope>>,
    /// Latest scheduled round per receiver
    link_clock: BTreeMap<NodeId, u64>,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `envelope`, sent during `round`, after `delay` rounds
    ///
    /// Returns the round the message is due.
    pub fn schedule(&mut self, envelope: Envelope, round: u64, delay: u64) -> u64 {
        let earliest = round + delay.max(1);
        let clock = self.link_clock.entry(envelope.receiver).or_insert(0);
        let due = earliest.max(*clock);
        *clock = due;
        self.pending.push(Reverse(envelope.scheduled_for(due)));
        due
    }

    /// Remove every envelope due at or before `round`, in delivery order
    pub fn drain_due(&mut self, round: u64) -> Vec<Envelope> {
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.pending.peek() {
            if next.scheduled_round.is_some_and(|at| at > round) {
                break;
            }
            if let Some(Reverse(envelope)) = self.pending.pop() {
                due.push(envelope);
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
