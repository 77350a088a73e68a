//! Edge cases and safety valves

use std::sync::Arc;
use std::time::Duration;

use ghs_core::Graph;
use ghs_simulation::{
    BarrierError, DelayModel, GraphBuilder, MstReport, NodeId, RoundBarrier, SimConfig,
    Simulation, SimulationError,
};

#[tokio::test]
async fn test_round_ceiling_forces_exit() {
    ghs_logging::init_for_tests();

    let graph = GraphBuilder::new(6).with_seed(4).ring().unwrap();
    let config = SimConfig::deterministic(4)
        .with_delay(DelayModel::Uniform { min: 5, max: 19 })
        .with_max_rounds(Some(3));

    let err = Simulation::new(graph.clone(), config).run().await.unwrap_err();
    match err {
        SimulationError::RoundLimitExceeded {
            limit,
            nodes,
            partial,
        } => {
            assert_eq!(limit, 3);
            assert_eq!(nodes.len(), 6);
            assert_eq!(partial.nodes.len(), 6);
            assert!(partial.nodes.values().all(|s| s.forced_exit));
            // Whatever was built so far belongs to the tree
            let reference = graph.minimum_spanning_tree();
            assert!(partial.edges.is_subset(&reference));
        }
        other => panic!("expected RoundLimitExceeded, got {}", other),
    }
}

#[tokio::test]
async fn test_single_node_halts_immediately() {
    ghs_logging::init_for_tests();

    let graph = Graph::new(1);
    let report = Simulation::new(graph, SimConfig::deterministic(1))
        .run_and_verify()
        .await
        .unwrap();

    assert!(report.edges.is_empty());
    assert_eq!(report.leader, Some(NodeId(0)));
    assert_eq!(report.core_edge, None);
    assert_eq!(report.messages, 0);
    assert_eq!(report.nodes[&NodeId(0)].level, 0);
}

#[tokio::test]
async fn test_empty_graph_reports_nothing() {
    let report = Simulation::new(Graph::new(0), SimConfig::default())
        .run_and_verify()
        .await
        .unwrap();
    assert_eq!(report, MstReport::empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let graph = GraphBuilder::new(3).line().unwrap();
    let config = SimConfig::default().with_delay(DelayModel::Uniform { min: 9, max: 3 });
    let err = Simulation::new(graph, config).run().await.unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_generous_barrier_timeout_does_not_fire() {
    ghs_logging::init_for_tests();

    let graph = GraphBuilder::new(6).with_seed(2).random_connected(0.3).unwrap();
    let config = SimConfig::deterministic(2).with_barrier_timeout(Some(Duration::from_secs(10)));
    let report = Simulation::new(graph, config).run_and_verify().await.unwrap();
    assert_eq!(report.claimed_leaders.len(), 1);
}

#[tokio::test]
async fn test_missing_party_times_out() {
    let barrier = Arc::new(RoundBarrier::new(3).with_timeout(Some(Duration::from_millis(50))));

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.wait().await })
        })
        .collect();

    for waiter in waiters {
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(BarrierError::TimedOut { waited_ms: 50 })));
    }

    let err = SimulationError::from(BarrierError::TimedOut { waited_ms: 50 });
    assert_eq!(err.to_string(), "Barrier error: Barrier wait timed out after 50ms");
}
