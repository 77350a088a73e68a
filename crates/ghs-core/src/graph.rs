//! Weighted undirected graph
//!
//! The graph is the read-only input to a simulation run:
//! - Vertices are numbered densely from zero
//! - Each undirected edge is stored once and indexed by its endpoint pair
//! - Every vertex keeps the list of its incident edges
//!
//! Construction rejects self loops, duplicate edges, out-of-range vertices and
//! non-finite weights, so the algorithm only ever sees a simple graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::edge::Edge;
use crate::error::{GraphError, GraphResult};
use crate::identity::NodeId;
use crate::union_find::DisjointSets;

/// A simple weighted undirected graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertex_count: usize,
    edges: BTreeMap<(NodeId, NodeId), Edge>,
    adjacency: Vec<Vec<Edge>>,
}

impl Graph {
    /// Create a graph with `vertex_count` isolated vertices
    pub fn new(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            edges: BTreeMap::new(),
            adjacency: vec![Vec::new(); vertex_count],
        }
    }

    /// Build a graph from `(u, v, weight)` triples
    pub fn from_edges(vertex_count: usize, edges: &[(u32, u32, f64)]) -> GraphResult<Self> {
        let mut graph = Self::new(vertex_count);
        for &(u, v, weight) in edges {
            graph.add_edge(NodeId(u), NodeId(v), weight)?;
        }
        Ok(graph)
    }

    /// Build a graph from per-vertex `(neighbor, weight)` lists
    ///
    /// An edge may be listed from both endpoints; the two listings must carry
    /// the same weight.
    pub fn from_adjacency(lists: &[Vec<(NodeId, f64)>]) -> GraphResult<Self> {
        let mut graph = Self::new(lists.len());
        for (index, neighbors) in lists.iter().enumerate() {
            let vertex = NodeId(index as u32);
            for &(neighbor, weight) in neighbors {
                match graph.edge_between(vertex, neighbor) {
                    Some(existing) if existing.weight.total_cmp(&weight).is_eq() => {}
                    Some(existing) => {
                        return Err(GraphError::AsymmetricWeight {
                            u: existing.u,
                            v: existing.v,
                            first: existing.weight,
                            second: weight,
                        });
                    }
                    None => graph.add_edge(vertex, neighbor, weight)?,
                }
            }
        }
        Ok(graph)
    }

    /// Add an undirected edge
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, weight: f64) -> GraphResult<()> {
        for vertex in [a, b] {
            if vertex.index() >= self.vertex_count {
                return Err(GraphError::UnknownVertex {
                    vertex,
                    count: self.vertex_count,
                });
            }
        }
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        if !weight.is_finite() {
            return Err(GraphError::InvalidWeight { u: a, v: b, weight });
        }

        let edge = Edge::new(a, b, weight);
        if self.edges.contains_key(&edge.endpoints()) {
            return Err(GraphError::DuplicateEdge { u: edge.u, v: edge.v });
        }

        self.edges.insert(edge.endpoints(), edge);
        self.adjacency[edge.u.index()].push(edge);
        self.adjacency[edge.v.index()].push(edge);
        Ok(())
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All vertex ids
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        NodeId::range(self.vertex_count)
    }

    /// All edges, in endpoint order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Edges incident to `vertex` (empty for unknown vertices)
    pub fn incident(&self, vertex: NodeId) -> &[Edge] {
        self.adjacency
            .get(vertex.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Neighbors of `vertex`
    pub fn neighbors(&self, vertex: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.incident(vertex).iter().map(move |edge| edge.other(vertex))
    }

    /// The edge joining `a` and `b`, if any
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<Edge> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.edges.get(&key).copied()
    }

    /// Sum of all edge weights
    pub fn total_weight(&self) -> f64 {
        self.edges.values().map(|edge| edge.weight).sum()
    }

    /// Connected components, each sorted by id, ordered by their lowest id
    pub fn components(&self) -> Vec<Vec<NodeId>> {
        let mut sets = self.disjoint_sets();
        let mut by_root: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for vertex in self.node_ids() {
            by_root.entry(sets.find(vertex.index())).or_default().push(vertex);
        }
        let mut components: Vec<_> = by_root.into_values().collect();
        components.sort_by_key(|component| component[0]);
        components
    }

    /// True if every vertex can reach every other (vacuously true for 0 or 1 vertices)
    pub fn is_connected(&self) -> bool {
        self.vertex_count <= 1 || self.disjoint_sets().set_count() == 1
    }

    /// Reject disconnected graphs
    pub fn ensure_connected(&self) -> GraphResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(GraphError::Disconnected {
                components: self.disjoint_sets().set_count(),
            })
        }
    }

    /// Reference minimum spanning tree (a forest for disconnected graphs)
    ///
    /// Kruskal over the same total edge order the distributed algorithm uses,
    /// so on a connected graph the result is the unique MST it must produce.
    pub fn minimum_spanning_tree(&self) -> BTreeSet<Edge> {
        let mut sets = DisjointSets::new(self.vertex_count);
        let ordered: BTreeSet<Edge> = self.edges.values().copied().collect();

        let mut tree = BTreeSet::new();
        for edge in ordered {
            if sets.union(edge.u.index(), edge.v.index()) {
                tree.insert(edge);
            }
        }
        tree
    }

    fn disjoint_sets(&self) -> DisjointSets {
        let mut sets = DisjointSets::new(self.vertex_count);
        for edge in self.edges.values() {
            sets.union(edge.u.index(), edge.v.index());
        }
        sets
    }
}
