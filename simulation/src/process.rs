//! Round driver for one node
//!
//! A [`Process`] owns a [`GhsNode`] plus everything the node needs to talk
//! to the rest of the network: its inbox, send handles to its neighbors and
//! the coordinator, a delayed send buffer, and a delay source. Each round
//! runs in five phases:
//!
//! 1. replay deferred work, then flush messages due this round
//! 2. barrier: every send for this round has landed
//! 3. drain the inbox in `(scheduled_round, sender, seq)` order
//! 4. barrier: every node is done handling
//! 5. maybe send `Exit`, then advance the round

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;

use ghs_core::{Envelope, Message, NodeId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::barrier::RoundBarrier;
use crate::buffer::SendBuffer;
use crate::config::SimConfig;
use crate::delay::DelaySource;
use crate::error::{SimResult, SimulationError};
use crate::node::GhsNode;
use crate::report::NodeSummary;
use crate::trace::TraceEntry;

/// Channels and shared handles a process is started with
pub struct ProcessWiring {
    pub inbox: mpsc::UnboundedReceiver<Envelope>,
    /// Inbox senders of every neighbor, keyed by neighbor id
    pub neighbors: BTreeMap<NodeId, mpsc::UnboundedSender<Envelope>>,
    pub coordinator: mpsc::UnboundedSender<Envelope>,
    pub barrier: Arc<RoundBarrier>,
}

/// What a finished process hands back to the coordinator
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub summary: NodeSummary,
    /// Sends recorded by this node, empty unless tracing was enabled
    pub trace: Vec<TraceEntry>,
}

/// Async driver that runs one node in lock-step with the others
pub struct Process {
    node: GhsNode,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    neighbors: BTreeMap<NodeId, mpsc::UnboundedSender<Envelope>>,
    coordinator: mpsc::UnboundedSender<Envelope>,
    barrier: Arc<RoundBarrier>,
    delays: Box<dyn DelaySource>,
    buffer: SendBuffer,
    /// Envelopes being handled in the current round, self-addressed ones included
    current: BinaryHeap<Reverse<Envelope>>,
    round: u64,
    next_seq: u64,
    max_rounds: Option<u64>,
    record_trace: bool,
    trace: Vec<TraceEntry>,
    messages_sent: u64,
    exit_sent: bool,
    forced_exit: bool,
}

impl Process {
    pub fn new(
        node: GhsNode,
        wiring: ProcessWiring,
        delays: Box<dyn DelaySource>,
        config: &SimConfig,
    ) -> Self {
        Self {
            node,
            inbox: wiring.inbox,
            neighbors: wiring.neighbors,
            coordinator: wiring.coordinator,
            barrier: wiring.barrier,
            delays,
            buffer: SendBuffer::new(),
            current: BinaryHeap::new(),
            round: 0,
            next_seq: 0,
            max_rounds: config.max_rounds,
            record_trace: config.record_trace,
            trace: Vec::new(),
            messages_sent: 0,
            exit_sent: false,
            forced_exit: false,
        }
    }

    pub fn uid(&self) -> NodeId {
        self.node.uid()
    }

    /// Run rounds until the coordinator's shutdown has been handled
    pub async fn run(mut self) -> SimResult<ProcessOutcome> {
        let result = self.run_rounds().await;
        if result.is_err() {
            // Let the surviving parties keep their rendezvous
            self.barrier.leave();
        }
        result?;

        debug!(
            rounds = self.round + 1,
            messages = self.messages_sent,
            level = self.node.level(),
            "Process finished"
        );
        Ok(ProcessOutcome {
            summary: NodeSummary::from_node(
                &self.node,
                self.round + 1,
                self.messages_sent,
                self.forced_exit,
            ),
            trace: std::mem::take(&mut self.trace),
        })
    }

    async fn run_rounds(&mut self) -> SimResult<()> {
        self.node.wake_up();
        self.route_outbox();

        loop {
            // Phase 1: local pre-processing and flush
            self.node.on_round_start();
            self.route_outbox();
            self.flush_due()?;

            // Phase 2
            self.barrier.wait().await?;

            // Phase 3
            self.drain_inbox();

            // Phase 4
            self.barrier.wait().await?;

            // Phase 5
            self.maybe_exit()?;
            if self.node.self_kill() {
                self.barrier.leave();
                return Ok(());
            }
            if self.exit_sent {
                // A lone party never parks at the barrier; let the coordinator run
                tokio::task::yield_now().await;
            }
            self.round += 1;
        }
    }

    /// Stamp and schedule everything the node produced
    fn route_outbox(&mut self) {
        let uid = self.uid();
        for (receiver, message) in self.node.take_outbox() {
            let seq = self.next_seq;
            self.next_seq += 1;
            let envelope = Envelope::new(uid, receiver, seq, message);

            if receiver == uid {
                // Joins the drain in progress
                self.current.push(Reverse(envelope.scheduled_for(self.round)));
                continue;
            }

            let kind = envelope.kind();
            let delay = self.delays.next_delay(receiver);
            let scheduled_round = self.buffer.schedule(envelope, self.round, delay);
            self.messages_sent += 1;
            if self.record_trace {
                self.trace.push(TraceEntry {
                    sent_round: self.round,
                    scheduled_round,
                    sender: uid,
                    receiver,
                    seq,
                    delay,
                    kind,
                });
            }
        }
    }

    /// Hand every envelope due this round to its receiver's inbox
    fn flush_due(&mut self) -> SimResult<()> {
        for envelope in self.buffer.drain_due(self.round) {
            let receiver = envelope.receiver;
            let Some(link) = self.neighbors.get(&receiver) else {
                return Err(SimulationError::NodeFailed {
                    node: self.uid(),
                    reason: format!("no link to {}", receiver),
                });
            };
            if link.send(envelope).is_err() {
                if self.exit_sent {
                    debug!(receiver = %receiver, "Dropping send to a finished node");
                    continue;
                }
                return Err(SimulationError::InboxClosed(receiver));
            }
        }
        Ok(())
    }

    fn drain_inbox(&mut self) {
        while let Ok(envelope) = self.inbox.try_recv() {
            self.current.push(Reverse(envelope));
        }

        while let Some(Reverse(envelope)) = self.current.pop() {
            self.node.handle(envelope.sender, envelope.message);
            self.route_outbox();
        }
    }

    fn maybe_exit(&mut self) -> SimResult<()> {
        if self.exit_sent {
            return Ok(());
        }

        if self.node.ready_to_exit() && self.buffer.is_empty() {
            info!(
                round = self.round,
                level = self.node.level(),
                leader = self.node.is_leader(),
                "Sending exit"
            );
            return self.send_exit(false);
        }

        if let Some(limit) = self.max_rounds
            && self.round + 1 >= limit
        {
            warn!(
                round = self.round,
                limit,
                level = self.node.level(),
                state = ?self.node.state(),
                basic = self.node.basic_edges().len(),
                buffered = self.buffer.len(),
                deferred = self.node.deferred_tests(),
                pending_connects = self.node.pending_connects(),
                "Round ceiling reached, forcing exit"
            );
            self.forced_exit = true;
            return self.send_exit(true);
        }

        Ok(())
    }

    fn send_exit(&mut self, forced: bool) -> SimResult<()> {
        let uid = self.uid();
        let report = self.node.exit_report(self.round, forced);
        let envelope = Envelope::new(uid, NodeId::COORDINATOR, self.next_seq, Message::Exit(report))
            .scheduled_for(self.round);
        self.next_seq += 1;
        self.coordinator
            .send(envelope)
            .map_err(|_| SimulationError::CoordinatorClosed)?;
        self.exit_sent = true;
        Ok(())
    }
}
