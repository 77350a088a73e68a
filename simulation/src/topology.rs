//! Weighted graph topologies
//!
//! Provides builders for the graph shapes the simulation is usually run on:
//! - Ring: each vertex connected to its two neighbors
//! - Line: a path through all vertices
//! - Star: the highest id in the center
//! - Complete: every vertex connected to every other
//! - Grid: a `width x height` lattice
//! - Random: a random spanning tree plus extra edges with a given probability
//! - Custom: build from an edge list
//!
//! Weights are integers drawn uniformly from `1..=max_weight`, so ties are
//! common and exercise the edge tie-break.

use ghs_core::{Graph, GraphResult, NodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Builder for weighted topologies
#[derive(Debug)]
pub struct GraphBuilder {
    vertex_count: usize,
    max_weight: u32,
    rng: StdRng,
}

impl GraphBuilder {
    /// Create a builder for `vertex_count` vertices, numbered from 0
    pub fn new(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            max_weight: 100,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Draw weights from a seeded generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Upper bound for drawn weights (at least 1)
    pub fn with_max_weight(mut self, max_weight: u32) -> Self {
        self.max_weight = max_weight.max(1);
        self
    }

    /// Build a ring: 0 - 1 - 2 - ... - (n-1) - 0
    ///
    /// Fewer than three vertices cannot close a simple ring and yield a line.
    pub fn ring(mut self) -> GraphResult<Graph> {
        let n = self.vertex_count;
        let mut graph = Graph::new(n);
        for i in 0..n.saturating_sub(1) {
            self.connect(&mut graph, i, i + 1)?;
        }
        if n >= 3 {
            self.connect(&mut graph, n - 1, 0)?;
        }
        Ok(graph)
    }

    /// Build a line: 0 - 1 - 2 - ...
    pub fn line(mut self) -> GraphResult<Graph> {
        let mut graph = Graph::new(self.vertex_count);
        for i in 0..self.vertex_count.saturating_sub(1) {
            self.connect(&mut graph, i, i + 1)?;
        }
        Ok(graph)
    }

    /// Build a star with the highest id in the center
    pub fn star(mut self) -> GraphResult<Graph> {
        let mut graph = Graph::new(self.vertex_count);
        if let Some(center) = self.vertex_count.checked_sub(1) {
            for leaf in 0..center {
                self.connect(&mut graph, center, leaf)?;
            }
        }
        Ok(graph)
    }

    /// Build a complete graph
    pub fn complete(mut self) -> GraphResult<Graph> {
        let mut graph = Graph::new(self.vertex_count);
        for i in 0..self.vertex_count {
            for j in (i + 1)..self.vertex_count {
                self.connect(&mut graph, i, j)?;
            }
        }
        Ok(graph)
    }

    /// Build a `width x height` lattice, ignoring the vertex count given to `new`
    pub fn grid(mut self, width: usize, height: usize) -> GraphResult<Graph> {
        let mut graph = Graph::new(width * height);
        for row in 0..height {
            for col in 0..width {
                let here = row * width + col;
                if col + 1 < width {
                    self.connect(&mut graph, here, here + 1)?;
                }
                if row + 1 < height {
                    self.connect(&mut graph, here, here + width)?;
                }
            }
        }
        Ok(graph)
    }

    /// Build a connected random graph
    ///
    /// A random spanning tree guarantees connectivity; every other pair is
    /// then connected with probability `extra_edge_probability`.
    pub fn random_connected(mut self, extra_edge_probability: f64) -> GraphResult<Graph> {
        let n = self.vertex_count;
        let mut graph = Graph::new(n);

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng);
        for i in 1..order.len() {
            let parent = order[self.rng.random_range(0..i)];
            self.connect(&mut graph, order[i], parent)?;
        }

        let probability = extra_edge_probability.clamp(0.0, 1.0);
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (NodeId(i as u32), NodeId(j as u32));
                if graph.edge_between(a, b).is_none() && self.rng.random_bool(probability) {
                    self.connect(&mut graph, i, j)?;
                }
            }
        }
        Ok(graph)
    }

    fn connect(&mut self, graph: &mut Graph, a: usize, b: usize) -> GraphResult<()> {
        let weight = self.rng.random_range(1..=self.max_weight);
        graph.add_edge(NodeId(a as u32), NodeId(b as u32), f64::from(weight))
    }
}

/// Create a graph from an edge list; the vertex count is one past the highest id
pub fn from_edges(edges: &[(u32, u32, f64)]) -> GraphResult<Graph> {
    let vertex_count = edges
        .iter()
        .map(|&(u, v, _)| u.max(v) as usize + 1)
        .max()
        .unwrap_or(0);
    Graph::from_edges(vertex_count, edges)
}
