//! Simulation facade
//!
//! Ties a graph, a [`SimConfig`], and optionally a recorded trace to a
//! [`Coordinator`] run.

use std::sync::Arc;

use ghs_core::Graph;
use tracing::{info, warn};

use crate::config::SimConfig;
use crate::coordinator::Coordinator;
use crate::error::{SimResult, SimulationError};
use crate::report::MstReport;
use crate::trace::MessageTrace;

/// One GHS run over a graph
#[derive(Debug, Clone)]
pub struct Simulation {
    graph: Arc<Graph>,
    config: SimConfig,
    replay: Option<MessageTrace>,
}

impl Simulation {
    pub fn new(graph: Graph, config: SimConfig) -> Self {
        Self {
            graph: Arc::new(graph),
            config,
            replay: None,
        }
    }

    /// Re-run a recorded schedule through fresh nodes
    pub fn replay(graph: Graph, config: SimConfig, trace: MessageTrace) -> Self {
        Self {
            graph: Arc::new(graph),
            config,
            replay: Some(trace),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run to completion
    pub async fn run(&self) -> SimResult<MstReport> {
        let mut coordinator = Coordinator::new(self.graph.clone(), self.config.clone());
        if let Some(trace) = &self.replay {
            info!(sends = trace.len(), "Replaying recorded schedule");
            coordinator = coordinator.with_replay(trace.clone());
        }
        coordinator.run().await
    }

    /// Run, then check the result against the graph
    pub async fn run_and_verify(&self) -> SimResult<MstReport> {
        let report = self.run().await?;
        match report.verify(&self.graph) {
            Ok(()) => Ok(report),
            Err(failures) => {
                for failure in &failures {
                    warn!("Verification failed: {}", failure);
                }
                Err(SimulationError::VerificationFailed {
                    failures,
                    report: Box::new(report),
                })
            }
        }
    }
}
