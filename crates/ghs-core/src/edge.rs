//! Weighted undirected edges
//!
//! Edges are totally ordered: by weight first, then by endpoint ids. The
//! algorithm depends on no two distinct edges comparing equal anywhere in the
//! graph, otherwise two fragments could disagree on which edge is "the"
//! minimum outgoing one and the mutual-Connect merge would never fire.

use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::identity::NodeId;

/// An undirected weighted edge, stored with `u < v`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    pub u: NodeId,
    pub v: NodeId,
    pub weight: f64,
}

impl Edge {
    /// Create an edge, normalising the endpoint order
    pub fn new(a: NodeId, b: NodeId, weight: f64) -> Self {
        let (u, v) = if a <= b { (a, b) } else { (b, a) };
        Self { u, v, weight }
    }

    /// Both endpoints, lower id first
    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.u, self.v)
    }

    /// True if `node` is one of the endpoints
    pub fn contains(&self, node: NodeId) -> bool {
        self.u == node || self.v == node
    }

    /// The endpoint opposite `node`
    ///
    /// Callers must pass an endpoint; for a non-endpoint this returns `u`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if node == self.u { self.v } else { self.u }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Edge {}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.u.cmp(&other.u))
            .then_with(|| self.v.cmp(&other.v))
    }
}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.u.hash(state);
        self.v.hash(state);
        self.weight.to_bits().hash(state);
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} ({})", self.u, self.v, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_normalises_endpoints() {
        let edge = Edge::new(NodeId(3), NodeId(1), 2.5);
        assert_eq!(edge.endpoints(), (NodeId(1), NodeId(3)));
        assert_eq!(edge, Edge::new(NodeId(1), NodeId(3), 2.5));
    }

    #[test]
    fn test_edge_order_weight_then_ids() {
        let light = Edge::new(NodeId(5), NodeId(6), 1.0);
        let heavy = Edge::new(NodeId(0), NodeId(1), 2.0);
        assert!(light < heavy);

        // Equal weights fall back to endpoint ids
        let a = Edge::new(NodeId(0), NodeId(5), 1.0);
        let b = Edge::new(NodeId(1), NodeId(5), 1.0);
        let c = Edge::new(NodeId(1), NodeId(6), 1.0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_edge_other_endpoint() {
        let edge = Edge::new(NodeId(2), NodeId(4), 1.0);
        assert_eq!(edge.other(NodeId(2)), NodeId(4));
        assert_eq!(edge.other(NodeId(4)), NodeId(2));
        assert!(edge.contains(NodeId(4)));
        assert!(!edge.contains(NodeId(3)));
    }

    #[test]
    fn test_edge_display() {
        let edge = Edge::new(NodeId(1), NodeId(0), 4.0);
        assert_eq!(edge.to_string(), "0-1 (4)");
    }
}
