//! End-to-end behaviour of the topology engine through its public API.

use chrono::{Duration, Utc};
use service_topology::{
    config::ServiceCatalog,
    dependency_graph::{DependencyGraph, DependencyType},
    impact::{ChangeProposal, ChangeType, Severity},
    risk::{ChangeOutcome, HistoricalChange, Trend},
    GraphAnalyzer, ImpactSimulator, LogEntryParser, RiskCalculator,
};

fn ingest(lines: &[&str]) -> DependencyGraph {
    let parser = LogEntryParser::new().unwrap();
    let mut graph = DependencyGraph::new();
    for line in lines {
        if let Some(observation) = parser.parse(line) {
            graph.record(&observation);
        }
    }
    graph
}

#[test]
fn rpc_and_database_traffic_builds_a_chain() {
    let mut lines = Vec::new();
    lines.extend(std::iter::repeat("OrderService -> InventoryService.checkStock() 80ms").take(50));
    lines.extend(std::iter::repeat("InventoryService -> PostgreSQL SELECT orders 35ms").take(50));
    let graph = ingest(&lines);

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    let rpc = graph.edge("OrderService", "InventoryService").unwrap();
    let db = graph.edge("InventoryService", "PostgreSQL").unwrap();
    assert_eq!(rpc.weight, 50);
    assert_eq!(rpc.dependency_type, DependencyType::Rpc);
    assert_eq!(db.weight, 50);
    assert_eq!(db.dependency_type, DependencyType::Database);

    let analyzer = GraphAnalyzer::new(&graph);
    assert!(analyzer.find_single_points_of_failure(2).is_empty());

    let paths = analyzer.critical_paths(5);
    assert_eq!(paths[0].path, vec!["OrderService", "InventoryService", "PostgreSQL"]);
    assert_eq!(paths[0].latency, 115.0);
}

#[test]
fn snapshot_reconstruction_preserves_analysis() {
    let graph = ingest(&[
        "[2025-01-30 10:00:01] WebApp called AuthService GET /api/validate 45ms",
        "[2025-01-30 10:00:02] Mobile called AuthService GET /api/validate 50ms",
        "[2025-01-30 10:00:03] Batch called AuthService POST /api/token 60ms",
        "[2025-01-30 10:00:04] AuthService -> SessionService.lookup() 5ms",
        "[2025-01-30 10:00:05] SessionService -> AuthService.refresh() 7ms",
        "[2025-01-30 10:00:06] SessionService -> Redis GET session 1ms",
        "[2025-01-30 10:00:07] Loop -> Loop 3ms",
    ]);

    let json = serde_json::to_string(&graph.to_snapshot()).unwrap();
    let rebuilt = DependencyGraph::from_snapshot(&serde_json::from_str(&json).unwrap());

    let original = GraphAnalyzer::new(&graph);
    let copy = GraphAnalyzer::new(&rebuilt);
    assert!(!original.find_cycles().is_empty());
    assert_eq!(original.find_cycles(), copy.find_cycles());
    assert_eq!(
        original.find_single_points_of_failure(2),
        copy.find_single_points_of_failure(2)
    );
    assert_eq!(original.critical_paths(5), copy.critical_paths(5));
}

#[test]
fn insertion_order_does_not_change_results() {
    let forward = ingest(&["A -> B 1ms", "B -> C 1ms", "C -> A 1ms", "X -> C 1ms", "Y -> C 1ms"]);
    let reverse = ingest(&["Y -> C 1ms", "X -> C 1ms", "C -> A 1ms", "B -> C 1ms", "A -> B 1ms"]);

    let a = GraphAnalyzer::new(&forward);
    let b = GraphAnalyzer::new(&reverse);
    assert_eq!(a.find_cycles(), b.find_cycles());
    assert_eq!(a.critical_paths(5), b.critical_paths(5));
}

#[test]
fn shared_dependency_is_flagged_and_failure_spreads_to_callers() {
    let graph = ingest(&["A -> C 10ms", "B -> C 10ms", "D -> C 10ms"]);
    let spofs = GraphAnalyzer::new(&graph).find_single_points_of_failure(2);
    assert_eq!(spofs[0].service, "C");
    assert_eq!(spofs[0].in_degree, 3);

    let catalog = ServiceCatalog::new();
    let result = ImpactSimulator::new(&graph, &catalog).simulate_failure("C");
    assert_eq!(result.affected_services, vec!["A", "B", "D"]);
    assert_eq!(result.blast_radius, 3);
    assert_eq!(result.severity, Severity::Medium);
    assert_eq!(serde_json::to_value(&result).unwrap()["severity"], "medium");
}

#[test]
fn change_assessment_combines_structure_and_history() {
    let graph = ingest(&[
        "Web -> Orders 10ms",
        "Mobile -> Orders 10ms",
        "Orders -> Postgres INSERT orders 5ms",
    ]);
    let catalog = ServiceCatalog::new();
    let simulator = ImpactSimulator::new(&graph, &catalog);

    let mut calculator = RiskCalculator::new();
    for day in 0..5 {
        calculator.add_historical_data(HistoricalChange {
            service: "Orders".to_string(),
            change_type: ChangeType::SchemaChange,
            predicted_risk: 60.0,
            actual_outcome: ChangeOutcome::MajorIncident,
            timestamp: Utc::now() - Duration::days(day),
        });
    }

    let proposal = ChangeProposal {
        change_type: ChangeType::SchemaChange,
        target_service: "Orders".to_string(),
        description: "add column".to_string(),
        proposer: "dba".to_string(),
    };
    let assessment = calculator.assess(&proposal, &simulator);

    assert_eq!(assessment.multiplier, 1.3);
    assert_eq!(assessment.assessment.upstream_blast_radius, 2);
    assert_eq!(assessment.assessment.dependency_depth.get("Postgres"), Some(&1));
    assert!(assessment.adjusted_risk >= assessment.assessment.base_risk);
    assert!(assessment.adjusted_risk <= 100.0);
    assert_eq!(assessment.trend.trend, Trend::Increasing);

    assert_eq!(calculator.get_adjusted_risk(50.0, ChangeType::SchemaChange), 65.0);
    assert_eq!(calculator.get_adjusted_risk(50.0, ChangeType::ApiModification), 50.0);
    assert_eq!(calculator.get_risk_trend("svc-x", 30).trend, Trend::InsufficientData);
}
