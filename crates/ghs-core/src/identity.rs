//! Node identities
//!
//! Vertices are numbered densely from zero, and the vertex number doubles as
//! the node's uid for leader tie-breaks. The coordinator uses a sentinel id
//! that can never collide with a vertex.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identity of a simulated node (a graph vertex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sender id carried by messages originating at the coordinator
    pub const COORDINATOR: NodeId = NodeId(u32::MAX);

    /// Create a node id from a vertex index
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Generate ids `0..count`
    pub fn range(count: usize) -> impl Iterator<Item = NodeId> {
        (0..count as u32).map(NodeId)
    }

    /// The vertex index as a `usize`, for indexing adjacency tables
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// True for the coordinator sentinel
    pub fn is_coordinator(&self) -> bool {
        *self == Self::COORDINATOR
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_coordinator() {
            write!(f, "coordinator")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_range() {
        let ids: Vec<_> = NodeId::range(3).collect();
        assert_eq!(ids, vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(ids[2].index(), 2);
    }

    #[test]
    fn test_coordinator_sentinel() {
        assert!(NodeId::COORDINATOR.is_coordinator());
        assert!(!NodeId(0).is_coordinator());
        assert!(NodeId(1_000_000) < NodeId::COORDINATOR);
        assert_eq!(NodeId::COORDINATOR.to_string(), "coordinator");
        assert_eq!(NodeId(7).to_string(), "7");
    }
}
