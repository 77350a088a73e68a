//! Run results
//!
//! [`NodeSummary`] is one node's final state, returned by its task.
//! [`MstReport`] is what the coordinator assembles from all Exit reports and
//! summaries. [`MstReport::verify`] checks it against the graph.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use ghs_core::{Edge, ExitReport, Graph, NodeId, ProtocolViolation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::GhsNode;
use crate::process::ProcessOutcome;
use crate::trace::MessageTrace;

/// Final state of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node: NodeId,
    pub level: u32,
    pub leader: NodeId,
    pub parent: Option<NodeId>,
    pub core_edge: Option<Edge>,
    pub branch_edges: BTreeSet<Edge>,
    pub basic_edges: BTreeSet<Edge>,
    pub rejected_edges: BTreeSet<Edge>,
    pub level_history: Vec<u32>,
    pub rounds: u64,
    pub messages_sent: u64,
    pub forced_exit: bool,
    pub violations: Vec<ProtocolViolation>,
}

impl NodeSummary {
    pub fn from_node(node: &GhsNode, rounds: u64, messages_sent: u64, forced_exit: bool) -> Self {
        Self {
            node: node.uid(),
            level: node.level(),
            leader: node.leader(),
            parent: node.parent(),
            core_edge: node.core_edge(),
            branch_edges: node.branch_edges().clone(),
            basic_edges: node.basic_edges().clone(),
            rejected_edges: node.rejected_edges().clone(),
            level_history: node.level_history().to_vec(),
            rounds,
            messages_sent,
            forced_exit,
            violations: node.violations().to_vec(),
        }
    }
}

/// Something about a finished run that does not hold
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum VerificationFailure {
    #[error("tree weight {actual} differs from reference {expected} (missing {missing:?}, extra {extra:?})")]
    EdgeSetMismatch {
        expected: f64,
        actual: f64,
        missing: Vec<Edge>,
        extra: Vec<Edge>,
    },

    #[error("{count} node(s) claim leadership")]
    LeaderCount { count: usize },

    #[error("nodes disagree on the core edge")]
    CoreDisagreement,

    #[error("branch edge {edge} is not held by both endpoints")]
    AsymmetricBranch { edge: Edge },

    #[error("node {node} moved to a lower level")]
    LevelDecreased { node: NodeId },

    #[error("edge {edge} at node {node} is not exactly one of branch or rejected")]
    UnclassifiedEdge { node: NodeId, edge: Edge },

    #[error("node {node}: {violation}")]
    Violation {
        node: NodeId,
        violation: ProtocolViolation,
    },

    #[error("no result from node {node}")]
    MissingNode { node: NodeId },
}

/// Result of a complete run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MstReport {
    /// Union of every node's branch edges
    pub edges: BTreeSet<Edge>,
    pub total_weight: f64,
    /// The leader, when exactly one node claims it
    pub leader: Option<NodeId>,
    pub claimed_leaders: Vec<NodeId>,
    pub core_edge: Option<Edge>,
    pub core_edges_agree: bool,
    /// Rounds executed by the longest-running node
    pub rounds: u64,
    /// Network messages sent by all nodes
    pub messages: u64,
    pub nodes: BTreeMap<NodeId, NodeSummary>,
    pub violations: Vec<(NodeId, ProtocolViolation)>,
    pub trace: Option<MessageTrace>,
}

impl MstReport {
    /// Report for a graph with no vertices
    pub fn empty() -> Self {
        Self {
            edges: BTreeSet::new(),
            total_weight: 0.0,
            leader: None,
            claimed_leaders: Vec::new(),
            core_edge: None,
            core_edges_agree: true,
            rounds: 0,
            messages: 0,
            nodes: BTreeMap::new(),
            violations: Vec::new(),
            trace: None,
        }
    }

    /// Assemble a report from the coordinator's exits and the joined tasks
    pub fn assemble(
        exits: &BTreeMap<NodeId, ExitReport>,
        outcomes: BTreeMap<NodeId, ProcessOutcome>,
        record_trace: bool,
    ) -> Self {
        let edges: BTreeSet<Edge> = exits
            .values()
            .flat_map(|exit| exit.branch_edges.iter().copied())
            .collect();
        let total_weight = edges.iter().map(|edge| edge.weight).sum();

        let claimed_leaders: Vec<NodeId> = exits
            .values()
            .filter(|exit| exit.is_leader)
            .map(|exit| exit.node)
            .collect();
        let leader = match claimed_leaders.as_slice() {
            [only] => Some(*only),
            _ => None,
        };

        let core_edge = leader
            .and_then(|leader| exits.get(&leader))
            .or_else(|| exits.values().next())
            .and_then(|exit| exit.core_edge);
        let core_edges_agree = exits.values().all(|exit| exit.core_edge == core_edge);

        let mut nodes = BTreeMap::new();
        let mut trace_entries = Vec::new();
        for (id, outcome) in outcomes {
            trace_entries.extend(outcome.trace);
            nodes.insert(id, outcome.summary);
        }

        let rounds = nodes.values().map(|s| s.rounds).max().unwrap_or(0);
        let messages = nodes.values().map(|s| s.messages_sent).sum();
        let violations = nodes
            .values()
            .flat_map(|s| s.violations.iter().map(|v| (s.node, v.clone())))
            .collect();

        Self {
            edges,
            total_weight,
            leader,
            claimed_leaders,
            core_edge,
            core_edges_agree,
            rounds,
            messages,
            nodes,
            violations,
            trace: record_trace.then(|| MessageTrace::from_entries(trace_entries)),
        }
    }

    /// Nodes whose exit was forced by the round ceiling
    pub fn forced_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|s| s.forced_exit)
            .map(|s| s.node)
            .collect()
    }

    /// Check the run against the graph it was computed on
    pub fn verify(&self, graph: &Graph) -> Result<(), Vec<VerificationFailure>> {
        let mut failures = Vec::new();

        let reference = graph.minimum_spanning_tree();
        if self.edges != reference {
            failures.push(VerificationFailure::EdgeSetMismatch {
                expected: reference.iter().map(|e| e.weight).sum(),
                actual: self.total_weight,
                missing: reference.difference(&self.edges).copied().collect(),
                extra: self.edges.difference(&reference).copied().collect(),
            });
        }

        if graph.vertex_count() > 0 && self.claimed_leaders.len() != 1 {
            failures.push(VerificationFailure::LeaderCount {
                count: self.claimed_leaders.len(),
            });
        }
        if !self.core_edges_agree {
            failures.push(VerificationFailure::CoreDisagreement);
        }

        for edge in &self.edges {
            let (u, v) = edge.endpoints();
            let held = |node: NodeId| {
                self.nodes
                    .get(&node)
                    .is_some_and(|s| s.branch_edges.contains(edge))
            };
            if !held(u) || !held(v) {
                failures.push(VerificationFailure::AsymmetricBranch { edge: *edge });
            }
        }

        for node in graph.node_ids() {
            let Some(summary) = self.nodes.get(&node) else {
                failures.push(VerificationFailure::MissingNode { node });
                continue;
            };

            if summary.level_history.windows(2).any(|w| w[1] < w[0]) {
                failures.push(VerificationFailure::LevelDecreased { node });
            }

            for edge in graph.incident(node) {
                let branch = summary.branch_edges.contains(edge);
                let rejected = summary.rejected_edges.contains(edge);
                if branch == rejected || summary.basic_edges.contains(edge) {
                    failures.push(VerificationFailure::UnclassifiedEdge { node, edge: *edge });
                }
            }
        }

        failures.extend(
            self.violations
                .iter()
                .map(|(node, violation)| VerificationFailure::Violation {
                    node: *node,
                    violation: violation.clone(),
                }),
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut output = String::new();
        let leader = self
            .leader
            .map(|l| l.to_string())
            .unwrap_or_else(|| format!("none ({} claimed)", self.claimed_leaders.len()));
        let core = self
            .core_edge
            .map(|e| e.to_string())
            .unwrap_or_else(|| "none".to_string());

        let _ = writeln!(output, "Minimum Spanning Tree:");
        let _ = writeln!(output, "  Nodes: {}", self.nodes.len());
        let _ = writeln!(output, "  Edges: {}", self.edges.len());
        let _ = writeln!(output, "  Total weight: {}", self.total_weight);
        let _ = writeln!(output, "  Leader: {}", leader);
        let _ = writeln!(
            output,
            "  Core edge: {}{}",
            core,
            if self.core_edges_agree { "" } else { " (disputed)" }
        );
        let _ = writeln!(output, "  Rounds: {}", self.rounds);
        let _ = writeln!(output, "  Messages: {}\n", self.messages);

        for edge in &self.edges {
            let _ = writeln!(output, "  {}", edge);
        }

        let forced = self.forced_nodes();
        if !forced.is_empty() {
            let ids: Vec<String> = forced.iter().map(|n| n.to_string()).collect();
            let _ = writeln!(output, "\n  Forced exits: [{}]", ids.join(", "));
        }
        if !self.violations.is_empty() {
            let _ = writeln!(output, "\n  Protocol violations:");
            for (node, violation) in &self.violations {
                let _ = writeln!(output, "    {}: {}", node, violation);
            }
        }
        output
    }
}
