//! Whole-run properties on generated graphs
//!
//! Every run is checked against Kruskal and the structural properties of a
//! finished GHS run: one leader, agreed core, symmetric tree edges, levels
//! that never decrease, and every edge classified.

use ghs_core::Graph;
use ghs_simulation::{DelayModel, GraphBuilder, MstReport, SimConfig, Simulation};

async fn run_checked(graph: Graph, config: SimConfig) -> MstReport {
    let reference = graph.minimum_spanning_tree();
    let report = Simulation::new(graph, config)
        .run_and_verify()
        .await
        .unwrap_or_else(|e| panic!("run failed: {}", e));
    assert_eq!(report.edges, reference);
    report
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_graphs_match_kruskal() {
    ghs_logging::init_for_tests();

    for seed in 0..12 {
        let graph = GraphBuilder::new(14)
            .with_seed(seed)
            .with_max_weight(20)
            .random_connected(0.25)
            .unwrap();
        let vertices = graph.vertex_count();
        let report = run_checked(graph, SimConfig::deterministic(seed * 31 + 5)).await;

        assert_eq!(report.edges.len(), vertices - 1, "seed {}", seed);
        assert_eq!(report.claimed_leaders.len(), 1);
        assert!(report.core_edges_agree);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_heavily_tied_weights() {
    ghs_logging::init_for_tests();

    // Every weight is 1 or 2, so the endpoint tie-break decides almost everything
    for seed in 0..6 {
        let graph = GraphBuilder::new(12)
            .with_seed(seed)
            .with_max_weight(2)
            .random_connected(0.4)
            .unwrap();
        run_checked(graph, SimConfig::deterministic(seed)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_structured_topologies() {
    ghs_logging::init_for_tests();

    let graphs = vec![
        GraphBuilder::new(9).with_seed(1).ring().unwrap(),
        GraphBuilder::new(9).with_seed(2).line().unwrap(),
        GraphBuilder::new(8).with_seed(3).star().unwrap(),
        GraphBuilder::new(7).with_seed(4).complete().unwrap(),
        GraphBuilder::new(0).with_seed(5).grid(4, 3).unwrap(),
    ];
    for (index, graph) in graphs.into_iter().enumerate() {
        run_checked(graph, SimConfig::deterministic(index as u64)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tree_edges_are_symmetric_and_levels_monotone() {
    ghs_logging::init_for_tests();

    let graph = GraphBuilder::new(16)
        .with_seed(77)
        .random_connected(0.2)
        .unwrap();
    let report = run_checked(graph.clone(), SimConfig::deterministic(77)).await;

    for edge in &report.edges {
        let (u, v) = edge.endpoints();
        assert!(report.nodes[&u].branch_edges.contains(edge));
        assert!(report.nodes[&v].branch_edges.contains(edge));
    }
    for summary in report.nodes.values() {
        assert!(summary.level_history.windows(2).all(|w| w[0] <= w[1]));
        assert!(summary.basic_edges.is_empty());
        assert_eq!(
            summary.branch_edges.len() + summary.rejected_edges.len(),
            graph.incident(summary.node).len()
        );
        assert!(summary.violations.is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wide_delay_range() {
    ghs_logging::init_for_tests();

    let graph = GraphBuilder::new(10)
        .with_seed(8)
        .random_connected(0.3)
        .unwrap();
    let config = SimConfig::deterministic(8).with_delay(DelayModel::Uniform { min: 1, max: 40 });
    let report = run_checked(graph, config).await;
    assert!(report.rounds > 1);
    assert!(report.messages > 0);
}
