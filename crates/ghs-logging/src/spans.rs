//! Standard spans
//!
//! Every node task runs inside a `process` span and the coordinator inside a
//! `coordinator` span, so JSONL output can be grouped per node.

use ghs_core::NodeId;
use tracing::{Span, info_span};

/// Span wrapping one node's task
pub fn process_span(node: NodeId) -> Span {
    info_span!("process", node = %node)
}

/// Span wrapping the coordinator
pub fn coordinator_span(nodes: usize) -> Span {
    info_span!("coordinator", nodes = nodes)
}
