//! GHS protocol messages
//!
//! A closed set of message kinds exchanged between nodes, plus the two
//! coordinator messages:
//! - `Initiate`: starts a search phase or spreads fragment identity
//! - `Test` / `Accept` / `Reject`: classify a basic edge
//! - `Report`: convergecast of the best outgoing edge in a subtree
//! - `ChangeRoot`: routes the leader's decision toward the chosen edge
//! - `Connect`: offer to merge across the chosen edge
//! - `Halt`: the fragment has no outgoing edge left; stop searching
//! - `Exit`: a node's final state, sent to the coordinator
//! - `Shutdown`: the coordinator's end-of-run broadcast
//!
//! Every message travels inside an [`Envelope`] that records sender,
//! receiver, the round it is due, and a per-sender sequence number.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::identity::NodeId;

/// Whether a fragment is looking for its minimum outgoing edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    /// Searching: testing edges and collecting reports
    Find,
    /// Not searching: reported, waiting, or done
    Found,
}

/// Payload of an `Exit` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitReport {
    pub node: NodeId,
    pub core_edge: Option<Edge>,
    pub branch_edges: BTreeSet<Edge>,
    pub is_leader: bool,
    pub level: u32,
    pub round: u64,
    /// True when the round ceiling forced the exit
    pub forced: bool,
}

/// Protocol message payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Initiate {
        level: u32,
        core_edge: Option<Edge>,
        leader: NodeId,
        state: SearchState,
    },
    Test {
        core_edge: Option<Edge>,
        level: u32,
    },
    Accept {
        level: u32,
    },
    Reject,
    Report {
        mwoe: Option<Edge>,
    },
    ChangeRoot {
        mwoe: Edge,
    },
    Connect {
        level: u32,
        mwoe: Edge,
    },
    Halt,
    Exit(ExitReport),
    Shutdown,
}

impl Message {
    /// The payload-free tag of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Initiate { .. } => MessageKind::Initiate,
            Message::Test { .. } => MessageKind::Test,
            Message::Accept { .. } => MessageKind::Accept,
            Message::Reject => MessageKind::Reject,
            Message::Report { .. } => MessageKind::Report,
            Message::ChangeRoot { .. } => MessageKind::ChangeRoot,
            Message::Connect { .. } => MessageKind::Connect,
            Message::Halt => MessageKind::Halt,
            Message::Exit(_) => MessageKind::Exit,
            Message::Shutdown => MessageKind::Shutdown,
        }
    }
}

/// Message tags, used in traces and logs
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[display("INITIATE")]
    Initiate,
    #[display("TEST")]
    Test,
    #[display("ACCEPT")]
    Accept,
    #[display("REJECT")]
    Reject,
    #[display("REPORT")]
    Report,
    #[display("CHANGEROOT")]
    ChangeRoot,
    #[display("CONNECT")]
    Connect,
    #[display("HALT")]
    Halt,
    #[display("EXIT")]
    Exit,
    #[display("SHUTDOWN")]
    Shutdown,
}

/// A message in transit
///
/// Envelopes order by `(scheduled_round, sender, seq)`: the order in which a
/// receiver processes them. `scheduled_round` is `None` until a node
/// schedules the message, which only coordinator messages skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: NodeId,
    pub receiver: NodeId,
    pub scheduled_round: Option<u64>,
    pub seq: u64,
    pub message: Message,
}

impl Envelope {
    /// Wrap a message that has not been scheduled yet
    pub fn new(sender: NodeId, receiver: NodeId, seq: u64, message: Message) -> Self {
        Self {
            sender,
            receiver,
            scheduled_round: None,
            seq,
            message,
        }
    }

    /// Set the round the message is due
    pub fn scheduled_for(mut self, round: u64) -> Self {
        self.scheduled_round = Some(round);
        self
    }

    /// Delivery order key
    pub fn order_key(&self) -> (Option<u64>, NodeId, u64) {
        (self.scheduled_round, self.sender, self.seq)
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}

impl Eq for Envelope {}

impl PartialOrd for Envelope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Envelope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}
