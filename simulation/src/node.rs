//! GHS node state machine
//!
//! [`GhsNode`] holds everything one vertex knows and reacts to one message at
//! a time. It performs no I/O: outgoing messages collect in an outbox that
//! the round driver ([`crate::process::Process`]) drains, stamps, and
//! schedules. This keeps the algorithm testable without tasks or barriers.
//!
//! A node moves through repeating phases:
//! - **Find**: test basic edges lightest-first and collect subtree reports
//! - **Found**: report sent upward, waiting for the leader's decision
//! - **Connect**: the node owning the fragment's minimum outgoing edge offers
//!   to merge across it
//! - **Merge / Absorb**: equal-level fragments that picked the same edge merge
//!   (level + 1, new core); a lower-level fragment is absorbed as-is
//!
//! A leader whose search finds no outgoing edge broadcasts `Halt`, and every
//! node that has seen `Halt` is ready to exit.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ghs_core::{Edge, ExitReport, Message, MessageKind, NodeId, ProtocolViolation, SearchState};
use tracing::{debug, info, trace, warn};

/// A Test this node cannot answer until its own level catches up
#[derive(Debug, Clone, Copy, PartialEq)]
struct DeferredTest {
    from: NodeId,
    edge: Edge,
    level: u32,
    core_edge: Option<Edge>,
}

/// A Connect that is neither a merge nor an absorb yet
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingConnect {
    from: NodeId,
    edge: Edge,
    level: u32,
}

/// Per-node GHS state
#[derive(Debug)]
pub struct GhsNode {
    uid: NodeId,
    /// Incident edges keyed by the neighbor at the far end
    edges: BTreeMap<NodeId, Edge>,

    level: u32,
    leader: NodeId,
    parent: Option<NodeId>,
    children: BTreeSet<NodeId>,
    core_edge: Option<Edge>,
    state: SearchState,

    mwoe: Option<Edge>,
    mwoe_sender: NodeId,

    basic_edges: BTreeSet<Edge>,
    branch_edges: BTreeSet<Edge>,
    rejected_edges: BTreeSet<Edge>,

    test_edge: Option<Edge>,
    accept_received: bool,
    no_basic_edges_left: bool,
    received_reports_from: BTreeSet<NodeId>,
    connect_sent: Option<Edge>,

    defer_queue: VecDeque<DeferredTest>,
    pending_connects: Vec<PendingConnect>,

    ready_to_exit: bool,
    self_kill: bool,

    level_history: Vec<u32>,
    violations: Vec<ProtocolViolation>,
    outbox: Vec<(NodeId, Message)>,
}

impl GhsNode {
    /// Create a sleeping node that knows only its incident edges
    pub fn new(uid: NodeId, incident: &[Edge]) -> Self {
        let edges: BTreeMap<NodeId, Edge> = incident
            .iter()
            .map(|edge| (edge.other(uid), *edge))
            .collect();
        let basic_edges = edges.values().copied().collect();

        Self {
            uid,
            edges,
            level: 0,
            leader: uid,
            parent: None,
            children: BTreeSet::new(),
            core_edge: None,
            state: SearchState::Found,
            mwoe: None,
            mwoe_sender: uid,
            basic_edges,
            branch_edges: BTreeSet::new(),
            rejected_edges: BTreeSet::new(),
            test_edge: None,
            accept_received: false,
            no_basic_edges_left: false,
            received_reports_from: BTreeSet::new(),
            connect_sent: None,
            defer_queue: VecDeque::new(),
            pending_connects: Vec::new(),
            ready_to_exit: false,
            self_kill: false,
            level_history: vec![0],
            violations: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn uid(&self) -> NodeId {
        self.uid
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn leader(&self) -> NodeId {
        self.leader
    }

    pub fn is_leader(&self) -> bool {
        self.leader == self.uid
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &BTreeSet<NodeId> {
        &self.children
    }

    pub fn core_edge(&self) -> Option<Edge> {
        self.core_edge
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn mwoe(&self) -> Option<Edge> {
        self.mwoe
    }

    pub fn basic_edges(&self) -> &BTreeSet<Edge> {
        &self.basic_edges
    }

    pub fn branch_edges(&self) -> &BTreeSet<Edge> {
        &self.branch_edges
    }

    pub fn rejected_edges(&self) -> &BTreeSet<Edge> {
        &self.rejected_edges
    }

    /// Levels this node has passed through, in order
    pub fn level_history(&self) -> &[u32] {
        &self.level_history
    }

    pub fn violations(&self) -> &[ProtocolViolation] {
        &self.violations
    }

    /// Tests waiting for this node's level to catch up
    pub fn deferred_tests(&self) -> usize {
        self.defer_queue.len()
    }

    /// Connects waiting to become a merge or an absorb
    pub fn pending_connects(&self) -> usize {
        self.pending_connects.len()
    }

    /// The fragment has halted and this node has nothing left to search
    pub fn ready_to_exit(&self) -> bool {
        self.ready_to_exit
    }

    /// Shutdown was received; the driver stops after the current round
    pub fn self_kill(&self) -> bool {
        self.self_kill
    }

    /// Messages produced since the last call, as `(receiver, message)`
    pub fn take_outbox(&mut self) -> Vec<(NodeId, Message)> {
        std::mem::take(&mut self.outbox)
    }

    /// Final state for the coordinator
    pub fn exit_report(&self, round: u64, forced: bool) -> ExitReport {
        ExitReport {
            node: self.uid,
            core_edge: self.core_edge,
            branch_edges: self.branch_edges.clone(),
            is_leader: self.is_leader(),
            level: self.level,
            round,
            forced,
        }
    }

    /// Start the first search: a self-addressed Initiate
    pub fn wake_up(&mut self) {
        self.send(
            self.uid,
            Message::Initiate {
                level: self.level,
                core_edge: self.core_edge,
                leader: self.uid,
                state: SearchState::Find,
            },
        );
    }

    /// Local pre-processing at the top of every round
    ///
    /// Deferred Tests are re-evaluated against the current level and core,
    /// and pending Connects are re-classified until none changes.
    pub fn on_round_start(&mut self) {
        if !self.defer_queue.is_empty() {
            let deferred = std::mem::take(&mut self.defer_queue);
            for test in deferred {
                self.answer_test(test);
            }
        }

        while !self.pending_connects.is_empty() {
            let pending = std::mem::take(&mut self.pending_connects);
            let before = pending.len();
            for connect in pending {
                if !self.resolve_connect(connect) {
                    self.pending_connects.push(connect);
                }
            }
            if self.pending_connects.len() == before {
                break;
            }
        }
    }

    /// Dispatch one incoming message
    pub fn handle(&mut self, from: NodeId, message: Message) {
        trace!(node = %self.uid, from = %from, kind = %message.kind(), level = self.level, "Dispatch");

        match message {
            Message::Initiate {
                level,
                core_edge,
                leader,
                state,
            } => self.on_initiate(from, level, core_edge, leader, state),
            Message::Test { core_edge, level } => {
                if let Some(edge) = self.edge_to(from, MessageKind::Test) {
                    self.answer_test(DeferredTest {
                        from,
                        edge,
                        level,
                        core_edge,
                    });
                }
            }
            Message::Accept { .. } => self.on_accept(from),
            Message::Reject => self.on_reject(from),
            Message::Report { mwoe } => self.on_report(from, mwoe),
            Message::ChangeRoot { mwoe } => self.change_root(mwoe),
            Message::Connect { level, mwoe } => self.on_connect(from, level, mwoe),
            Message::Halt => self.halt(),
            Message::Exit(_) => {
                self.violation(ProtocolViolation::UnexpectedExit { from });
                self.self_kill = true;
            }
            Message::Shutdown => {
                debug!(node = %self.uid, "Shutdown received");
                self.self_kill = true;
            }
        }
    }

    fn on_initiate(
        &mut self,
        from: NodeId,
        level: u32,
        core_edge: Option<Edge>,
        leader: NodeId,
        state: SearchState,
    ) {
        if level < self.level {
            self.violation(ProtocolViolation::StaleInitiate {
                from,
                level,
                current: self.level,
            });
            return;
        }

        if from == self.uid {
            self.parent = None;
            self.leader = self.uid;
        } else {
            let Some(edge) = self.edge_to(from, MessageKind::Initiate) else {
                return;
            };
            // The absorbed side learns its new tree edge here
            if self.branch_edges.insert(edge) {
                self.basic_edges.remove(&edge);
                debug!(node = %self.uid, edge = %edge, "Joined fragment");
            }
            // A Connect queued over a tree edge was answered by this Initiate
            let branch_edges = &self.branch_edges;
            self.pending_connects
                .retain(|connect| !branch_edges.contains(&connect.edge));
            self.parent = Some(from);
            self.leader = leader;
            self.core_edge = core_edge;
        }

        self.set_level(level);
        self.state = state;
        self.mwoe = None;
        self.mwoe_sender = self.uid;
        self.accept_received = false;
        self.no_basic_edges_left = false;
        self.received_reports_from.clear();
        self.connect_sent = None;
        self.children = self.tree_neighbors_except(self.parent);

        let children: Vec<NodeId> = self.children.iter().copied().collect();
        for child in children {
            self.send(
                child,
                Message::Initiate {
                    level: self.level,
                    core_edge: self.core_edge,
                    leader: self.leader,
                    state,
                },
            );
        }

        if state == SearchState::Find {
            debug!(
                node = %self.uid,
                level = self.level,
                leader = %self.leader,
                children = self.children.len(),
                "Search phase started"
            );
            if self.test_edge.is_none() {
                self.test_next_basic_edge();
            }
        }
    }

    fn test_next_basic_edge(&mut self) {
        match self.basic_edges.first().copied() {
            Some(edge) => {
                self.test_edge = Some(edge);
                self.send(
                    edge.other(self.uid),
                    Message::Test {
                        core_edge: self.core_edge,
                        level: self.level,
                    },
                );
            }
            None => {
                self.test_edge = None;
                self.no_basic_edges_left = true;
                self.try_report();
            }
        }
    }

    fn answer_test(&mut self, test: DeferredTest) {
        let same_fragment = self.core_edge.is_some() && self.core_edge == test.core_edge;
        if same_fragment {
            if self.basic_edges.remove(&test.edge) {
                self.rejected_edges.insert(test.edge);
            }
            self.send(test.from, Message::Reject);
        } else if self.level >= test.level {
            self.send(test.from, Message::Accept { level: self.level });
        } else {
            trace!(node = %self.uid, from = %test.from, level = test.level, "Test deferred");
            self.defer_queue.push_back(test);
        }
    }

    fn on_accept(&mut self, from: NodeId) {
        let Some(edge) = self.edge_to(from, MessageKind::Accept) else {
            return;
        };
        if self.test_edge != Some(edge) {
            self.violation(ProtocolViolation::UnexpectedReply {
                from,
                kind: MessageKind::Accept,
            });
            return;
        }

        self.test_edge = None;
        if !self.basic_edges.contains(&edge) {
            // Retired while the reply was in flight; keep searching
            self.violation(ProtocolViolation::UnexpectedReply {
                from,
                kind: MessageKind::Accept,
            });
            self.test_next_basic_edge();
            return;
        }

        if self.mwoe.is_none_or(|best| edge < best) {
            self.mwoe = Some(edge);
            self.mwoe_sender = self.uid;
        }
        self.accept_received = true;
        self.try_report();
    }

    fn on_reject(&mut self, from: NodeId) {
        let Some(edge) = self.edge_to(from, MessageKind::Reject) else {
            return;
        };
        if self.test_edge != Some(edge) {
            self.violation(ProtocolViolation::UnexpectedReply {
                from,
                kind: MessageKind::Reject,
            });
            return;
        }

        self.test_edge = None;
        if self.basic_edges.remove(&edge) {
            self.rejected_edges.insert(edge);
        }
        self.test_next_basic_edge();
    }

    fn on_report(&mut self, from: NodeId, mwoe: Option<Edge>) {
        if !self.children.contains(&from) {
            self.violation(ProtocolViolation::ReportFromNonChild { from });
            return;
        }

        self.received_reports_from.insert(from);
        if let Some(edge) = mwoe {
            if self.mwoe.is_none_or(|best| edge < best) {
                self.mwoe = Some(edge);
                self.mwoe_sender = from;
            }
        }
        self.try_report();
    }

    /// Report upward, or decide, once the whole subtree has been heard from
    fn try_report(&mut self) {
        if self.state != SearchState::Find
            || !self.children.is_subset(&self.received_reports_from)
            || !(self.accept_received || self.no_basic_edges_left)
        {
            return;
        }

        self.state = SearchState::Found;
        if self.is_leader() {
            match self.mwoe {
                Some(edge) => {
                    debug!(node = %self.uid, level = self.level, mwoe = %edge, "Fragment chose outgoing edge");
                    self.change_root(edge);
                }
                None => {
                    info!(node = %self.uid, level = self.level, "No outgoing edge left, halting fragment");
                    self.halt();
                }
            }
        } else if let Some(parent) = self.parent {
            self.send(parent, Message::Report { mwoe: self.mwoe });
        }
    }

    /// Move the leader's decision one hop toward `edge`, or act on it
    fn change_root(&mut self, edge: Edge) {
        if edge.contains(self.uid) {
            self.basic_edges.remove(&edge);
            self.connect_sent = Some(edge);
            debug!(node = %self.uid, edge = %edge, level = self.level, "Sending connect");
            self.send(
                edge.other(self.uid),
                Message::Connect {
                    level: self.level,
                    mwoe: edge,
                },
            );
        } else {
            self.send(self.mwoe_sender, Message::ChangeRoot { mwoe: edge });
        }
    }

    fn on_connect(&mut self, from: NodeId, level: u32, mwoe: Edge) {
        let Some(edge) = self.edge_to(from, MessageKind::Connect) else {
            return;
        };
        if edge != mwoe {
            self.violation(ProtocolViolation::MisroutedConnect { from, edge: mwoe });
            return;
        }

        let connect = PendingConnect { from, edge, level };
        if !self.resolve_connect(connect) && !self.pending_connects.contains(&connect) {
            trace!(node = %self.uid, from = %from, level, "Connect pending");
            self.pending_connects.push(connect);
        }
    }

    /// Merge, absorb, or leave pending. Returns true if the Connect was consumed.
    fn resolve_connect(&mut self, connect: PendingConnect) -> bool {
        if connect.level == self.level && self.connect_sent == Some(connect.edge) {
            self.merge(connect);
            true
        } else if connect.level < self.level {
            self.absorb(connect);
            true
        } else {
            false
        }
    }

    fn merge(&mut self, connect: PendingConnect) {
        self.basic_edges.remove(&connect.edge);
        self.branch_edges.insert(connect.edge);
        self.core_edge = Some(connect.edge);
        self.set_level(self.level + 1);
        self.leader = self.uid.max(connect.from);
        self.connect_sent = None;
        self.state = SearchState::Found;

        info!(
            node = %self.uid,
            core = %connect.edge,
            level = self.level,
            leader = %self.leader,
            "Fragments merged"
        );

        if self.is_leader() {
            self.parent = None;
            self.wake_up();
        } else {
            self.parent = Some(connect.from);
        }
        self.children = self.tree_neighbors_except(self.parent);
    }

    fn absorb(&mut self, connect: PendingConnect) {
        self.basic_edges.remove(&connect.edge);
        self.branch_edges.insert(connect.edge);
        self.children.insert(connect.from);
        // Only a searching fragment waits for the newcomer's report
        if self.state == SearchState::Found {
            self.received_reports_from.insert(connect.from);
        }

        info!(
            node = %self.uid,
            absorbed = %connect.from,
            their_level = connect.level,
            level = self.level,
            "Absorbed fragment"
        );

        self.send(
            connect.from,
            Message::Initiate {
                level: self.level,
                core_edge: self.core_edge,
                leader: self.leader,
                state: self.state,
            },
        );
    }

    fn halt(&mut self) {
        if self.ready_to_exit {
            return;
        }
        self.ready_to_exit = true;
        let children: Vec<NodeId> = self.children.iter().copied().collect();
        for child in children {
            self.send(child, Message::Halt);
        }
    }

    fn tree_neighbors_except(&self, excluded: Option<NodeId>) -> BTreeSet<NodeId> {
        self.branch_edges
            .iter()
            .map(|edge| edge.other(self.uid))
            .filter(|neighbor| Some(*neighbor) != excluded)
            .collect()
    }

    fn edge_to(&mut self, neighbor: NodeId, kind: MessageKind) -> Option<Edge> {
        let edge = self.edges.get(&neighbor).copied();
        if edge.is_none() {
            self.violation(ProtocolViolation::UnknownNeighbor {
                from: neighbor,
                kind,
            });
        }
        edge
    }

    fn set_level(&mut self, level: u32) {
        if level != self.level {
            self.level = level;
            self.level_history.push(level);
        }
    }

    fn send(&mut self, to: NodeId, message: Message) {
        self.outbox.push((to, message));
    }

    fn violation(&mut self, violation: ProtocolViolation) {
        warn!(node = %self.uid, level = self.level, "Protocol violation: {}", violation);
        self.violations.push(violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghs_core::Graph;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::topology::GraphBuilder;

    /// Hand one message to `node`, then handle whatever it addressed to itself
    fn deliver(node: &mut GhsNode, from: NodeId, message: Message) {
        let uid = node.uid();
        node.handle(from, message);
        loop {
            let mut forwarded = false;
            for (next, message) in node.take_outbox() {
                if next == uid {
                    node.handle(uid, message);
                    forwarded = true;
                } else {
                    node.outbox.push((next, message));
                }
            }
            if !forwarded {
                break;
            }
        }
    }

    /// Delivers every node's outbox in global send order, one hop per
    /// step, running round-start processing between steps.
    struct Network {
        nodes: BTreeMap<NodeId, GhsNode>,
    }

    impl Network {
        fn new(graph: &Graph) -> Self {
            let nodes = graph
                .node_ids()
                .map(|id| (id, GhsNode::new(id, graph.incident(id))))
                .collect();
            Self { nodes }
        }

        fn node(&self, id: u32) -> &GhsNode {
            &self.nodes[&NodeId(id)]
        }

        fn run(&mut self) {
            for node in self.nodes.values_mut() {
                node.wake_up();
            }
            for _ in 0..10_000 {
                let mut in_flight = Vec::new();
                for (id, node) in self.nodes.iter_mut() {
                    node.on_round_start();
                    for (to, message) in node.take_outbox() {
                        in_flight.push((*id, to, message));
                    }
                }
                if in_flight.is_empty() && self.nodes.values().all(GhsNode::ready_to_exit) {
                    return;
                }
                for (from, to, message) in in_flight {
                    deliver(self.nodes.get_mut(&to).unwrap(), from, message);
                }
            }
            panic!("network did not quiesce");
        }
    }

    /// One FIFO queue per directed link. A seeded generator picks which
    /// non-empty link delivers next, so links interleave arbitrarily while
    /// each stays in order.
    struct FifoNetwork {
        nodes: BTreeMap<NodeId, GhsNode>,
        links: BTreeMap<(NodeId, NodeId), VecDeque<Message>>,
        rng: StdRng,
    }

    impl FifoNetwork {
        fn new(graph: &Graph, seed: u64) -> Self {
            Self {
                nodes: graph
                    .node_ids()
                    .map(|id| (id, GhsNode::new(id, graph.incident(id))))
                    .collect(),
                links: BTreeMap::new(),
                rng: StdRng::seed_from_u64(seed),
            }
        }

        fn collect_outboxes(&mut self) {
            for (id, node) in self.nodes.iter_mut() {
                for (to, message) in node.take_outbox() {
                    self.links.entry((*id, to)).or_default().push_back(message);
                }
            }
        }

        fn round_start_all(&mut self) {
            for node in self.nodes.values_mut() {
                node.on_round_start();
            }
        }

        /// Run to quiescence; returns false if the nodes stall
        fn run(&mut self) -> bool {
            let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
            for id in &ids {
                let node = self.nodes.get_mut(id).unwrap();
                node.wake_up();
                for (_, message) in node.take_outbox() {
                    deliver(node, *id, message);
                }
            }

            for _ in 0..100_000 {
                self.collect_outboxes();
                if self.rng.random_bool(0.2) {
                    self.round_start_all();
                    self.collect_outboxes();
                }

                let busy: Vec<(NodeId, NodeId)> = self
                    .links
                    .iter()
                    .filter(|(_, queue)| !queue.is_empty())
                    .map(|(link, _)| *link)
                    .collect();
                if busy.is_empty() {
                    if self.nodes.values().all(GhsNode::ready_to_exit) {
                        return true;
                    }
                    self.round_start_all();
                    self.collect_outboxes();
                    if self.links.values().all(VecDeque::is_empty) {
                        return false;
                    }
                    continue;
                }

                let (from, to) = busy[self.rng.random_range(0..busy.len())];
                let message = self.links.get_mut(&(from, to)).unwrap().pop_front().unwrap();
                deliver(self.nodes.get_mut(&to).unwrap(), from, message);
            }
            false
        }
    }

    fn edge(u: u32, v: u32, weight: f64) -> Edge {
        Edge::new(NodeId(u), NodeId(v), weight)
    }

    #[test]
    fn test_single_node_halts_immediately() {
        let mut node = GhsNode::new(NodeId(0), &[]);
        node.wake_up();
        let outbox = node.take_outbox();
        assert_eq!(outbox.len(), 1);
        let (to, message) = outbox.into_iter().next().unwrap();
        assert_eq!(to, NodeId(0));
        node.handle(NodeId(0), message);

        assert!(node.ready_to_exit());
        assert!(node.is_leader());
        assert!(node.core_edge().is_none());
        assert!(node.take_outbox().is_empty());
    }

    #[test]
    fn test_single_edge_merges_with_higher_uid_leading() {
        let graph = Graph::from_edges(2, &[(0, 1, 5.0)]).unwrap();
        let mut network = Network::new(&graph);
        network.run();

        let e = edge(0, 1, 5.0);
        for id in [0, 1] {
            let node = network.node(id);
            assert_eq!(node.level(), 1);
            assert_eq!(node.core_edge(), Some(e));
            assert_eq!(node.leader(), NodeId(1));
            assert_eq!(node.branch_edges(), &BTreeSet::from([e]));
            assert!(node.basic_edges().is_empty());
            assert!(node.violations().is_empty());
        }
        assert!(network.node(1).is_leader());
        assert!(!network.node(0).is_leader());
    }

    #[test]
    fn test_four_cycle_excludes_heaviest_edge() {
        let graph =
            Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0), (3, 0, 4.0)]).unwrap();
        let mut network = Network::new(&graph);
        network.run();

        let tree: BTreeSet<Edge> = network
            .nodes
            .values()
            .flat_map(|node| node.branch_edges().iter().copied())
            .collect();
        assert_eq!(tree, graph.minimum_spanning_tree());
        assert!(!tree.contains(&edge(0, 3, 4.0)));

        assert!(network.node(0).rejected_edges().contains(&edge(0, 3, 4.0)));
        assert!(network.node(3).rejected_edges().contains(&edge(0, 3, 4.0)));

        let leaders: Vec<_> = network.nodes.values().filter(|n| n.is_leader()).collect();
        assert_eq!(leaders.len(), 1);
        let core = leaders[0].core_edge();
        for node in network.nodes.values() {
            assert_eq!(node.core_edge(), core);
            assert!(node.basic_edges().is_empty());
            assert!(node.violations().is_empty());
        }
    }

    #[test]
    fn test_answer_test_rules() {
        let e01 = edge(0, 1, 1.0);
        let e02 = edge(0, 2, 2.0);
        let mut node = GhsNode::new(NodeId(0), &[e01, e02]);

        // Different fragment, equal level: accept
        node.handle(NodeId(1), Message::Test { core_edge: Some(e01), level: 0 });
        assert_eq!(node.take_outbox(), vec![(NodeId(1), Message::Accept { level: 0 })]);

        // Higher level: deferred until this node catches up
        node.handle(NodeId(2), Message::Test { core_edge: Some(e02), level: 3 });
        assert!(node.take_outbox().is_empty());
        assert_eq!(node.deferred_tests(), 1);

        node.level = 3;
        node.core_edge = Some(e02);
        node.on_round_start();
        // Now in the same fragment: reject and retire the edge
        assert_eq!(node.take_outbox(), vec![(NodeId(2), Message::Reject)]);
        assert_eq!(node.deferred_tests(), 0);
        assert!(node.rejected_edges().contains(&e02));
        assert!(!node.basic_edges().contains(&e02));
    }

    #[test]
    fn test_report_from_non_child_is_a_violation() {
        let mut node = GhsNode::new(NodeId(0), &[edge(0, 1, 1.0)]);
        node.handle(NodeId(1), Message::Report { mwoe: None });
        assert_eq!(
            node.violations(),
            &[ProtocolViolation::ReportFromNonChild { from: NodeId(1) }]
        );
    }

    #[test]
    fn test_message_from_non_neighbor_is_a_violation() {
        let mut node = GhsNode::new(NodeId(0), &[edge(0, 1, 1.0)]);
        node.handle(NodeId(7), Message::Test { core_edge: None, level: 0 });
        assert!(matches!(
            node.violations(),
            [ProtocolViolation::UnknownNeighbor { from: NodeId(7), kind: MessageKind::Test }]
        ));
        assert!(node.take_outbox().is_empty());
    }

    #[test]
    fn test_lower_level_connect_is_absorbed() {
        let e01 = edge(0, 1, 1.0);
        let e02 = edge(0, 2, 2.0);
        let mut node = GhsNode::new(NodeId(0), &[e01, e02]);
        node.level = 1;
        node.core_edge = Some(e01);
        node.branch_edges.insert(e01);
        node.basic_edges.remove(&e01);
        node.leader = NodeId(1);

        node.handle(NodeId(2), Message::Connect { level: 0, mwoe: e02 });

        assert!(node.branch_edges().contains(&e02));
        assert!(node.children().contains(&NodeId(2)));
        assert_eq!(
            node.take_outbox(),
            vec![(
                NodeId(2),
                Message::Initiate {
                    level: 1,
                    core_edge: Some(e01),
                    leader: NodeId(1),
                    state: SearchState::Found,
                }
            )]
        );
    }

    #[test]
    fn test_equal_level_connect_waits_for_own_connect() {
        let e01 = edge(0, 1, 1.0);
        let mut node = GhsNode::new(NodeId(0), &[e01]);

        node.handle(NodeId(1), Message::Connect { level: 0, mwoe: e01 });
        assert_eq!(node.pending_connects(), 1);
        assert_eq!(node.level(), 0);

        // A duplicate is not queued twice
        node.handle(NodeId(1), Message::Connect { level: 0, mwoe: e01 });
        assert_eq!(node.pending_connects(), 1);

        // Once this side has connected over the same edge, the next round merges
        node.change_root(e01);
        node.take_outbox();
        node.on_round_start();
        assert_eq!(node.pending_connects(), 0);
        assert_eq!(node.level(), 1);
        assert_eq!(node.core_edge(), Some(e01));
        assert_eq!(node.leader(), NodeId(1));
        assert_eq!(node.parent(), Some(NodeId(1)));
        assert_eq!(node.level_history(), &[0, 1]);
    }

    #[test]
    fn test_accept_records_minimum_outgoing_edge() {
        let e01 = edge(0, 1, 2.0);
        let mut node = GhsNode::new(NodeId(0), &[e01]);
        node.wake_up();
        let (_, initiate) = node.take_outbox().remove(0);
        node.handle(NodeId(0), initiate);
        assert_eq!(
            node.take_outbox(),
            vec![(NodeId(1), Message::Test { core_edge: None, level: 0 })]
        );
        assert_eq!(node.mwoe(), None);

        node.handle(NodeId(1), Message::Accept { level: 0 });
        assert_eq!(node.mwoe(), Some(e01));
        // A lone leader acts on its own edge straight away
        assert_eq!(
            node.take_outbox(),
            vec![(NodeId(1), Message::Connect { level: 0, mwoe: e01 })]
        );
        assert_eq!(node.state(), SearchState::Found);
    }

    #[test]
    fn test_initiate_over_queued_connect_edge_drops_the_connect() {
        let e01 = edge(0, 1, 1.0);
        let e03 = edge(0, 3, 2.0);
        let mut node = GhsNode::new(NodeId(0), &[e01, e03]);
        node.level = 1;
        node.core_edge = Some(e01);
        node.branch_edges.insert(e01);
        node.basic_edges.remove(&e01);
        node.leader = NodeId(1);
        node.parent = Some(NodeId(1));

        // Node 3 connects first, then this fragment picks the same edge
        node.handle(NodeId(3), Message::Connect { level: 1, mwoe: e03 });
        assert_eq!(node.pending_connects(), 1);
        node.change_root(e03);
        node.take_outbox();

        // Node 3 merged and leads; its Initiate arrives before the next round
        node.handle(
            NodeId(3),
            Message::Initiate {
                level: 2,
                core_edge: Some(e03),
                leader: NodeId(3),
                state: SearchState::Find,
            },
        );
        assert_eq!(node.pending_connects(), 0);
        assert_eq!(node.parent(), Some(NodeId(3)));
        assert_eq!(node.children(), &BTreeSet::from([NodeId(1)]));
        node.take_outbox();

        // The stale Connect must not absorb the new leader
        node.on_round_start();
        assert!(node.take_outbox().is_empty());
        assert_eq!(node.parent(), Some(NodeId(3)));
        assert!(!node.children().contains(&NodeId(3)));
        assert!(node.violations().is_empty());
    }

    #[test]
    fn test_random_fifo_schedules_build_the_minimum_spanning_tree() {
        for seed in 0..300u64 {
            let n = 2 + (seed % 6) as usize;
            let graph = GraphBuilder::new(n)
                .with_seed(seed)
                .with_max_weight(3)
                .random_connected(0.5)
                .unwrap();
            let mut network = FifoNetwork::new(&graph, seed.wrapping_mul(31).wrapping_add(7));
            assert!(network.run(), "seed {} n {}: nodes stalled", seed, n);

            let tree: BTreeSet<Edge> = network
                .nodes
                .values()
                .flat_map(|node| node.branch_edges().iter().copied())
                .collect();
            assert_eq!(tree, graph.minimum_spanning_tree(), "seed {}", seed);

            let leaders = network.nodes.values().filter(|node| node.is_leader()).count();
            assert_eq!(leaders, 1, "seed {}", seed);
            for node in network.nodes.values() {
                assert!(node.violations().is_empty(), "seed {}: {:?}", seed, node.violations());
                assert!(node.basic_edges().is_empty(), "seed {}: node {}", seed, node.uid());
            }
        }
    }

    #[test]
    fn test_shutdown_sets_self_kill() {
        let mut node = GhsNode::new(NodeId(0), &[]);
        assert!(!node.self_kill());
        node.handle(NodeId::COORDINATOR, Message::Shutdown);
        assert!(node.self_kill());
        assert!(node.violations().is_empty());
    }
}
