//! # GHS Simulation
//!
//! An asynchronous Gallager-Humblet-Spira minimum spanning tree simulation.
//!
//! ## Overview
//!
//! Every vertex of a weighted graph runs as its own task and knows only its
//! incident edges. Nodes grow fragments by finding each fragment's minimum
//! outgoing edge and merging across it, until a single fragment spans the
//! graph and its leader halts the run.
//!
//! - **Round-based asynchrony**: every send draws a delay of one or more
//!   rounds, and links stay FIFO
//! - **Lock-step**: all nodes meet at two barrier rendezvous per round
//! - **Deterministic under a seed**: processing order is a pure function of
//!   the graph and the delay draws, so a recorded trace replays exactly
//!
//! ## Architecture
//!
//! - **Node** (`node.rs`): the sans-IO GHS state machine
//! - **Process** (`process.rs`): the per-node round driver
//! - **Barrier** (`barrier.rs`), **Buffer** (`buffer.rs`), **Delay** (`delay.rs`):
//!   the delivery machinery
//! - **Coordinator** (`coordinator.rs`): spawns the nodes and collects exits
//! - **Report** (`report.rs`): the resulting tree and its verification
//! - **Topology** (`topology.rs`), **Loader** (`loader.rs`),
//!   **Scenarios** (`scenarios.rs`): graphs to run on
//!
//! ## Example
//!
//! ```rust,ignore
//! use ghs_simulation::*;
//!
//! let graph = GraphBuilder::new(8).with_seed(1).random_connected(0.3)?;
//! let report = Simulation::new(graph, SimConfig::deterministic(7))
//!     .run_and_verify()
//!     .await?;
//! println!("{}", report.render());
//! ```

pub mod barrier;
pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod delay;
pub mod error;
pub mod loader;
pub mod node;
pub mod process;
pub mod report;
pub mod scenarios;
pub mod simulation;
pub mod topology;
pub mod trace;

pub use barrier::{BarrierWaitResult, RoundBarrier};
pub use config::{DelayModel, SimConfig};
pub use coordinator::Coordinator;
pub use delay::{DelaySource, FixedDelay, ReplayDelay, UniformDelay};
pub use error::{BarrierError, SimResult, SimulationError};
pub use loader::{GraphFormat, load_graph, parse_edge_list, parse_matrix};
pub use node::GhsNode;
pub use report::{MstReport, NodeSummary, VerificationFailure};
pub use scenarios::{Scenario, run_scenario};
pub use simulation::Simulation;
pub use topology::{GraphBuilder, from_edges};
pub use trace::{MessageTrace, TraceEntry};

pub use ghs_core::{Edge, Graph, NodeId};
