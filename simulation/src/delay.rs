//! Per-message transit delays
//!
//! Each node draws a delay (in rounds) for every message it sends. The
//! source is injected per node so runs can be reproduced:
//! - [`UniformDelay`]: seeded uniform draws, the normal mode
//! - [`FixedDelay`]: a constant, which reduces the run to lock-step
//! - [`ReplayDelay`]: the draws a node made in a recorded run

use std::collections::VecDeque;

use ghs_core::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::trace::MessageTrace;

/// Source of transit delays for one node's outgoing messages
pub trait DelaySource: Send {
    /// Rounds until a message sent now to `receiver` is due
    fn next_delay(&mut self, receiver: NodeId) -> u64;
}

/// Derive a per-node seed so nodes draw independent sequences from one run seed
pub fn node_seed(seed: u64, node: NodeId) -> u64 {
    seed ^ u64::from(node.0).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Uniform delays in `min..=max`
#[derive(Debug)]
pub struct UniformDelay {
    rng: StdRng,
    min: u64,
    max: u64,
}

impl UniformDelay {
    /// Seeded for reproducible runs, or from OS entropy when `seed` is `None`
    pub fn new(min: u64, max: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let min = min.max(1);
        Self {
            rng,
            min,
            max: max.max(min),
        }
    }
}

impl DelaySource for UniformDelay {
    fn next_delay(&mut self, _receiver: NodeId) -> u64 {
        self.rng.random_range(self.min..=self.max)
    }
}

/// The same delay for every message
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub u64);

impl DelaySource for FixedDelay {
    fn next_delay(&mut self, _receiver: NodeId) -> u64 {
        self.0.max(1)
    }
}

/// Replays one node's recorded draws
#[derive(Debug)]
pub struct ReplayDelay {
    node: NodeId,
    delays: VecDeque<u64>,
}

impl ReplayDelay {
    pub fn new(node: NodeId, delays: VecDeque<u64>) -> Self {
        Self { node, delays }
    }

    /// The draws `node` made in the recorded run
    pub fn from_trace(trace: &MessageTrace, node: NodeId) -> Self {
        Self::new(node, trace.delays_for(node))
    }

    /// Draws not yet replayed
    pub fn remaining(&self) -> usize {
        self.delays.len()
    }
}

impl DelaySource for ReplayDelay {
    fn next_delay(&mut self, receiver: NodeId) -> u64 {
        match self.delays.pop_front() {
            Some(delay) => delay.max(1),
            None => {
                warn!(
                    node = %self.node,
                    receiver = %receiver,
                    "Replay trace exhausted, falling back to a one-round delay"
                );
                1
            }
        }
    }
}
