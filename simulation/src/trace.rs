//! Message traces
//!
//! A trace records every network send of a run: who sent what to whom, the
//! delay that was drawn, and the round the message became due. Replaying the
//! recorded delays through a fresh node population reproduces the run
//! exactly, because processing order is a pure function of the schedule.

use std::collections::VecDeque;
use std::path::Path;

use ghs_core::{MessageKind, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::SimResult;

/// One recorded send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub sent_round: u64,
    pub scheduled_round: u64,
    pub sender: NodeId,
    pub receiver: NodeId,
    pub seq: u64,
    /// Delay drawn from the delay source, before the per-link FIFO clamp
    pub delay: u64,
    pub kind: MessageKind,
}

/// All sends of a run, ordered by `(sent_round, sender, seq)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTrace {
    pub entries: Vec<TraceEntry>,
}

impl MessageTrace {
    /// Merge per-node recordings into one ordered trace
    pub fn from_entries(mut entries: Vec<TraceEntry>) -> Self {
        entries.sort_by_key(|entry| (entry.sent_round, entry.sender, entry.seq));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delays drawn by `sender`, in the order it drew them
    pub fn delays_for(&self, sender: NodeId) -> VecDeque<u64> {
        let mut sends: Vec<&TraceEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.sender == sender)
            .collect();
        sends.sort_by_key(|entry| entry.seq);
        sends.into_iter().map(|entry| entry.delay).collect()
    }

    /// Number of recorded sends of each kind
    pub fn count(&self, kind: MessageKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    /// Write the trace as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a trace written by [`MessageTrace::save`]
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
