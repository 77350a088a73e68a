//! Error types for the GHS simulation core

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::edge::Edge;
use crate::identity::NodeId;
use crate::message::MessageKind;

/// Errors raised while building or loading a graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Self loop on vertex {0}")]
    SelfLoop(NodeId),

    #[error("Duplicate edge {u}-{v}")]
    DuplicateEdge { u: NodeId, v: NodeId },

    #[error("Edge {u}-{v} has non-finite weight {weight}")]
    InvalidWeight { u: NodeId, v: NodeId, weight: f64 },

    #[error("Vertex {vertex} out of range for a graph of {count} vertices")]
    UnknownVertex { vertex: NodeId, count: usize },

    #[error("Edge {u}-{v} listed with weights {first} and {second}")]
    AsymmetricWeight {
        u: NodeId,
        v: NodeId,
        first: f64,
        second: f64,
    },

    #[error("Graph is disconnected ({components} components)")]
    Disconnected { components: usize },

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Graph I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for graph construction
pub type GraphResult<T> = Result<T, GraphError>;

/// A message that the protocol says can never legitimately arrive
///
/// Violations are recorded and logged rather than corrected; any violation
/// in a finished run points at an ordering or state machine bug.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProtocolViolation {
    #[error("Report from {from}, which is not a child")]
    ReportFromNonChild { from: NodeId },

    #[error("Initiate from {from} at level {level} below own level {current}")]
    StaleInitiate {
        from: NodeId,
        level: u32,
        current: u32,
    },

    #[error("{kind} from {from} does not answer the outstanding test")]
    UnexpectedReply { from: NodeId, kind: MessageKind },

    #[error("Connect from {from} names {edge}, which is not the connecting edge")]
    MisroutedConnect { from: NodeId, edge: Edge },

    #[error("{kind} from {from}, which is not a neighbor")]
    UnknownNeighbor { from: NodeId, kind: MessageKind },

    #[error("Exit from {from} delivered to a node")]
    UnexpectedExit { from: NodeId },
}
