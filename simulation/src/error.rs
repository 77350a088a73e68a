//! Simulation error types

use ghs_core::{GraphError, NodeId};
use thiserror::Error;

use crate::report::{MstReport, VerificationFailure};

/// Errors that end a simulation run
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Graph construction or loading errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Lock-step was lost
    #[error("Barrier error: {0}")]
    Barrier(#[from] BarrierError),

    /// Configuration rejected before the run started
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A node's inbox was dropped while it still had work
    #[error("Inbox of node {0} closed")]
    InboxClosed(NodeId),

    /// The coordinator's exit queue was dropped
    #[error("Coordinator exit queue closed")]
    CoordinatorClosed,

    /// A node task returned an error
    #[error("Node {node} failed: {reason}")]
    NodeFailed { node: NodeId, reason: String },

    /// A node task panicked or was cancelled
    #[error("Node task aborted: {0}")]
    TaskPanicked(String),

    /// Reading or writing a config or trace file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config or trace file could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Nodes hit the round ceiling and were forced to exit
    #[error("Round limit of {limit} exceeded by {} node(s)", nodes.len())]
    RoundLimitExceeded {
        limit: u64,
        nodes: Vec<NodeId>,
        partial: Box<MstReport>,
    },

    /// The run finished but its result does not hold up
    #[error("Verification failed: {}", failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    VerificationFailed {
        failures: Vec<VerificationFailure>,
        report: Box<MstReport>,
    },
}

/// Round barrier errors
#[derive(Debug, Error)]
pub enum BarrierError {
    /// A party waited longer than the configured timeout
    #[error("Barrier wait timed out after {waited_ms}ms")]
    TimedOut { waited_ms: u64 },

    /// The generation channel was dropped
    #[error("Barrier closed")]
    Closed,

    /// Every party already left
    #[error("Barrier has no registered parties")]
    NoParties,
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimulationError>;
