//! Canonical scenarios
//!
//! Small graphs with known answers, used by the CLI and the integration
//! tests.

use clap::ValueEnum;
use derive_more::Display;
use ghs_core::{Graph, GraphResult, NodeId};
use tracing::info;

use crate::config::SimConfig;
use crate::error::SimResult;
use crate::report::MstReport;
use crate::simulation::Simulation;
use crate::topology::from_edges;

/// A named graph with a known minimum spanning tree
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// 4-cycle weighted 1, 2, 3, 4; the heaviest edge is left out
    #[display("four-cycle")]
    FourCycle,
    /// Two vertices, one edge: a single merge
    #[display("single-edge")]
    SingleEdge,
    /// Five leaves around center 5, every edge weighted 1
    #[display("star")]
    Star,
    /// Seven vertices and nine edges with many tied weights
    #[display("seven-node")]
    SevenNode,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::FourCycle,
        Scenario::SingleEdge,
        Scenario::Star,
        Scenario::SevenNode,
    ];

    pub fn graph(&self) -> GraphResult<Graph> {
        match self {
            Scenario::FourCycle => from_edges(&[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0), (3, 0, 4.0)]),
            Scenario::SingleEdge => from_edges(&[(0, 1, 1.0)]),
            Scenario::Star => from_edges(&[
                (5, 0, 1.0),
                (5, 1, 1.0),
                (5, 2, 1.0),
                (5, 3, 1.0),
                (5, 4, 1.0),
            ]),
            Scenario::SevenNode => from_edges(&[
                (0, 1, 1.0),
                (0, 5, 3.0),
                (1, 2, 3.0),
                (2, 3, 2.0),
                (3, 4, 1.0),
                (3, 6, 1.0),
                (4, 5, 2.0),
                (4, 6, 4.0),
                (5, 6, 3.0),
            ]),
        }
    }

    /// Weight of the minimum spanning tree
    pub fn expected_weight(&self) -> f64 {
        match self {
            Scenario::FourCycle => 6.0,
            Scenario::SingleEdge => 1.0,
            Scenario::Star => 5.0,
            Scenario::SevenNode => 10.0,
        }
    }

    /// The leader every run must elect, where the graph forces one
    pub fn expected_leader(&self) -> Option<NodeId> {
        match self {
            Scenario::SingleEdge => Some(NodeId(1)),
            Scenario::Star => Some(NodeId(5)),
            Scenario::FourCycle | Scenario::SevenNode => None,
        }
    }
}

/// Run a scenario and verify the result
pub async fn run_scenario(scenario: Scenario, config: SimConfig) -> SimResult<MstReport> {
    info!(scenario = %scenario, "=== Running scenario ===");
    let report = Simulation::new(scenario.graph()?, config)
        .run_and_verify()
        .await?;
    info!(
        scenario = %scenario,
        weight = report.total_weight,
        expected = scenario.expected_weight(),
        leader = ?report.leader,
        "Scenario complete"
    );
    Ok(report)
}
