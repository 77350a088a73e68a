//! Run coordinator
//!
//! Builds one [`Process`] per vertex, wires each to its neighbors' inboxes
//! and to the coordinator's exit queue, and spawns them all. It then
//! collects one Exit per node. After the last Exit it broadcasts Shutdown,
//! joins every task, and assembles the [`MstReport`].

use std::collections::BTreeMap;
use std::sync::Arc;

use ghs_core::{Envelope, ExitReport, Graph, Message, NodeId};
use ghs_logging::{coordinator_span, process_span};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, info, warn};

use crate::barrier::RoundBarrier;
use crate::config::SimConfig;
use crate::delay::{DelaySource, ReplayDelay};
use crate::error::{SimResult, SimulationError};
use crate::node::GhsNode;
use crate::process::{Process, ProcessOutcome, ProcessWiring};
use crate::report::MstReport;
use crate::trace::MessageTrace;

type TaskResult = (NodeId, SimResult<ProcessOutcome>);

/// Starts the node population and harvests the tree
pub struct Coordinator {
    graph: Arc<Graph>,
    config: SimConfig,
    replay: Option<MessageTrace>,
}

impl Coordinator {
    pub fn new(graph: Arc<Graph>, config: SimConfig) -> Self {
        Self {
            graph,
            config,
            replay: None,
        }
    }

    /// Draw every node's delays from a recorded trace instead of the delay model
    pub fn with_replay(mut self, trace: MessageTrace) -> Self {
        self.replay = Some(trace);
        self
    }

    pub async fn run(self) -> SimResult<MstReport> {
        self.config.validate()?;
        let nodes = self.graph.vertex_count();
        if nodes == 0 {
            info!("Empty graph, nothing to run");
            return Ok(MstReport::empty());
        }
        self.run_nodes().instrument(coordinator_span(nodes)).await
    }

    fn delays_for(&self, node: NodeId) -> Box<dyn DelaySource> {
        match &self.replay {
            Some(trace) => Box::new(ReplayDelay::from_trace(trace, node)),
            None => self.config.delay.source_for(node, self.config.seed),
        }
    }

    async fn run_nodes(self) -> SimResult<MstReport> {
        let count = self.graph.vertex_count();
        let (inboxes, receivers): (Vec<_>, Vec<_>) =
            (0..count).map(|_| mpsc::unbounded_channel::<Envelope>()).unzip();
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        let barrier =
            Arc::new(RoundBarrier::new(count).with_timeout(self.config.barrier_timeout()));

        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        for (id, inbox) in NodeId::range(count).zip(receivers) {
            let neighbors = self
                .graph
                .neighbors(id)
                .map(|neighbor| (neighbor, inboxes[neighbor.index()].clone()))
                .collect();
            let wiring = ProcessWiring {
                inbox,
                neighbors,
                coordinator: exit_tx.clone(),
                barrier: barrier.clone(),
            };
            let node = GhsNode::new(id, self.graph.incident(id));
            let process = Process::new(node, wiring, self.delays_for(id), &self.config);
            tasks.spawn(async move { (id, process.run().await) }.instrument(process_span(id)));
        }
        drop(exit_tx);

        info!(
            nodes = count,
            edges = self.graph.edge_count(),
            replay = self.replay.is_some(),
            "Processes started"
        );

        let mut collector = ExitCollector::default();
        let mut outcomes = BTreeMap::new();

        while collector.len() < count {
            tokio::select! {
                received = exit_rx.recv() => match received {
                    Some(envelope) => collector.record(envelope),
                    None => return Err(SimulationError::CoordinatorClosed),
                },
                joined = tasks.join_next(), if !tasks.is_empty() => {
                    if let Some(joined) = joined {
                        let (id, outcome) = unpack(joined)?;
                        warn!(node = %id, "Process finished before the run ended");
                        outcomes.insert(id, outcome);
                    }
                }
            }
        }

        info!(round = collector.last_round, "All processes exited, broadcasting shutdown");
        for (index, inbox) in inboxes.iter().enumerate() {
            let receiver = NodeId(index as u32);
            // A task that already finished has dropped its inbox
            let _ = inbox.send(Envelope::new(NodeId::COORDINATOR, receiver, 0, Message::Shutdown));
        }
        drop(inboxes);

        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = unpack(joined)?;
            outcomes.insert(id, outcome);
        }

        let report = MstReport::assemble(&collector.exits, outcomes, self.config.record_trace);
        let forced = report.forced_nodes();
        if !forced.is_empty() {
            warn!(forced = forced.len(), "Run hit the round ceiling");
            return Err(SimulationError::RoundLimitExceeded {
                limit: self.config.max_rounds.unwrap_or_default(),
                nodes: forced,
                partial: Box::new(report),
            });
        }

        info!(
            edges = report.edges.len(),
            weight = report.total_weight,
            leader = ?report.leader,
            rounds = report.rounds,
            messages = report.messages,
            "MST complete"
        );
        Ok(report)
    }
}

fn unpack(joined: Result<TaskResult, JoinError>) -> SimResult<(NodeId, ProcessOutcome)> {
    match joined {
        Ok((id, Ok(outcome))) => Ok((id, outcome)),
        Ok((id, Err(err))) => Err(SimulationError::NodeFailed {
            node: id,
            reason: err.to_string(),
        }),
        Err(err) => Err(SimulationError::TaskPanicked(err.to_string())),
    }
}

/// Exit reports received so far
#[derive(Debug, Default)]
struct ExitCollector {
    exits: BTreeMap<NodeId, ExitReport>,
    last_round: u64,
}

impl ExitCollector {
    fn len(&self) -> usize {
        self.exits.len()
    }

    fn record(&mut self, envelope: Envelope) {
        let Message::Exit(report) = envelope.message else {
            warn!(sender = %envelope.sender, kind = %envelope.kind(), "Ignoring non-exit message");
            return;
        };
        if self.exits.contains_key(&report.node) {
            warn!(node = %report.node, "Duplicate exit ignored");
            return;
        }

        debug!(
            node = %report.node,
            round = report.round,
            leader = report.is_leader,
            branches = report.branch_edges.len(),
            forced = report.forced,
            "Exit received"
        );
        self.last_round = self.last_round.max(report.round);
        self.exits.insert(report.node, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayModel;

    #[tokio::test]
    async fn test_empty_graph_spawns_nothing() {
        let report = Coordinator::new(Arc::new(Graph::new(0)), SimConfig::deterministic(1))
            .run()
            .await
            .unwrap();
        assert_eq!(report, MstReport::empty());
    }

    #[tokio::test]
    async fn test_triangle_under_fixed_delay() {
        let graph = Arc::new(
            Graph::from_edges(3, &[(0, 1, 1.0), (1, 2, 2.0), (0, 2, 3.0)]).unwrap(),
        );
        let config = SimConfig::deterministic(5).with_delay(DelayModel::Fixed { rounds: 1 });
        let report = Coordinator::new(graph.clone(), config).run().await.unwrap();

        assert_eq!(report.verify(&graph), Ok(()));
        assert_eq!(report.total_weight, 3.0);
        assert_eq!(report.nodes.len(), 3);
    }

    #[test]
    fn test_collector_ignores_duplicates() {
        let mut collector = ExitCollector::default();
        let node = GhsNode::new(NodeId(2), &[]);
        let exit = |round| {
            Envelope::new(
                NodeId(2),
                NodeId::COORDINATOR,
                0,
                Message::Exit(node.exit_report(round, false)),
            )
        };
        collector.record(exit(4));
        collector.record(exit(9));
        collector.record(Envelope::new(NodeId(1), NodeId::COORDINATOR, 0, Message::Halt));

        assert_eq!(collector.len(), 1);
        assert_eq!(collector.last_round, 4);
    }
}
