use crate::log_parser::DependencyObservation;
use chrono::{DateTime, Utc};
use petgraph::{
    algo::tarjan_scc,
    graph::NodeIndex,
    visit::EdgeRef,
    Directed, Direction, Graph,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Http,
    Rpc,
    Database,
    Generic,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyType::Http => "http",
            DependencyType::Rpc => "rpc",
            DependencyType::Database => "database",
            DependencyType::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Observed caller → callee relationship.
///
/// The mean latency is derived from a running total so that it is the exact
/// mean over every sample, not a smoothed estimate.
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    pub weight: u64,
    pub dependency_type: DependencyType,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    total_latency_ms: u64,
}

impl DependencyEdge {
    fn new(latency_ms: u64, dependency_type: DependencyType, timestamp: DateTime<Utc>) -> Self {
        Self {
            weight: 1,
            dependency_type,
            first_seen: timestamp,
            last_seen: timestamp,
            total_latency_ms: latency_ms,
        }
    }

    fn observe(&mut self, latency_ms: u64, dependency_type: DependencyType, timestamp: DateTime<Utc>) {
        self.weight += 1;
        self.total_latency_ms = self.total_latency_ms.saturating_add(latency_ms);
        self.dependency_type = dependency_type;
        self.last_seen = timestamp;
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.weight == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.weight as f64
        }
    }
}

/// Transport form of an edge, used by snapshots and dependency listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub caller: String,
    pub callee: String,
    pub weight: u64,
    pub avg_latency_ms: f64,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDependencies {
    /// Edges where the service is the caller.
    pub outgoing: Vec<EdgeRecord>,
    /// Edges where the service is the callee.
    pub incoming: Vec<EdgeRecord>,
}

/// In-memory service topology.
///
/// Service names are interned to petgraph node handles; every caller/callee
/// pair maps to exactly one edge. Nodes are never removed, so handles stay
/// valid for the lifetime of the graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: Graph<String, DependencyEdge, Directed>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed call. Creates missing nodes and never fails.
    pub fn add_dependency(
        &mut self,
        caller: &str,
        callee: &str,
        latency_ms: u64,
        dependency_type: DependencyType,
        timestamp: DateTime<Utc>,
    ) -> EdgeRecord {
        let from = self.ensure_node(caller);
        let to = self.ensure_node(callee);

        let edge = match self.graph.find_edge(from, to) {
            Some(edge) => {
                self.graph[edge].observe(latency_ms, dependency_type, timestamp);
                edge
            }
            None => self
                .graph
                .add_edge(from, to, DependencyEdge::new(latency_ms, dependency_type, timestamp)),
        };

        self.edge_record(from, to, &self.graph[edge])
    }

    pub fn record(&mut self, observation: &DependencyObservation) -> EdgeRecord {
        self.add_dependency(
            &observation.caller,
            &observation.callee,
            observation.latency_ms,
            observation.dependency_type,
            observation.timestamp,
        )
    }

    fn ensure_node(&mut self, service: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(service) {
            return index;
        }
        let index = self.graph.add_node(service.to_string());
        self.node_map.insert(service.to_string(), index);
        index
    }

    pub fn contains(&self, service: &str) -> bool {
        self.node_map.contains_key(service)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graph.node_weights().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn edge(&self, caller: &str, callee: &str) -> Option<EdgeRecord> {
        let from = self.index_of(caller)?;
        let to = self.index_of(callee)?;
        self.graph
            .find_edge(from, to)
            .map(|edge| self.edge_record(from, to, &self.graph[edge]))
    }

    /// Outgoing and incoming edges of `service`. Unknown services have none.
    pub fn get_dependencies(&self, service: &str) -> ServiceDependencies {
        let Some(index) = self.index_of(service) else {
            return ServiceDependencies::default();
        };

        let outgoing = self
            .successors(index)
            .into_iter()
            .filter_map(|callee| self.edge(service, self.name(callee)))
            .collect();
        let incoming = self
            .predecessors(index)
            .into_iter()
            .filter_map(|caller| self.edge(self.name(caller), service))
            .collect();

        ServiceDependencies { outgoing, incoming }
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self.services().into_iter().map(str::to_string).collect();
        let mut edges: Vec<EdgeRecord> = self
            .graph
            .edge_references()
            .map(|edge| self.edge_record(edge.source(), edge.target(), edge.weight()))
            .collect();
        edges.sort_by(|a, b| (&a.caller, &a.callee).cmp(&(&b.caller, &b.callee)));
        GraphSnapshot { nodes, edges }
    }

    /// Rebuild a graph from a snapshot, preserving weights, latency means and
    /// first/last-seen times.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut graph = Self::new();
        for node in &snapshot.nodes {
            graph.ensure_node(node);
        }
        for record in &snapshot.edges {
            let from = graph.ensure_node(&record.caller);
            let to = graph.ensure_node(&record.callee);
            let weight = record.weight.max(1);
            let edge = DependencyEdge {
                weight,
                dependency_type: record.dependency_type,
                first_seen: record.first_seen,
                last_seen: record.last_seen,
                total_latency_ms: (record.avg_latency_ms * weight as f64).round() as u64,
            };
            match graph.graph.find_edge(from, to) {
                Some(existing) => graph.graph[existing] = edge,
                None => {
                    graph.graph.add_edge(from, to, edge);
                }
            }
        }
        graph
    }

    pub fn stats(&self) -> GraphStats {
        let total_nodes = self.graph.node_count();
        let total_edges = self.graph.edge_count();

        let mut edge_types = BTreeMap::new();
        let mut total_observations = 0u64;
        for edge in self.graph.edge_weights() {
            *edge_types.entry(edge.dependency_type.to_string()).or_insert(0) += 1;
            total_observations += edge.weight;
        }

        let strongly_connected_components = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .count();

        GraphStats {
            total_nodes,
            total_edges,
            total_observations,
            edge_types,
            strongly_connected_components,
            avg_degree: if total_nodes > 0 {
                total_edges as f64 / total_nodes as f64
            } else {
                0.0
            },
        }
    }

    // Index-level accessors for the analysis passes. Ordering is by service
    // name so traversal results do not depend on insertion order.

    pub fn index_of(&self, service: &str) -> Option<NodeIndex> {
        self.node_map.get(service).copied()
    }

    pub fn name(&self, index: NodeIndex) -> &str {
        &self.graph[index]
    }

    pub fn sorted_indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        indices
    }

    pub fn successors(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(index, Direction::Outgoing)
    }

    pub fn predecessors(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(index, Direction::Incoming)
    }

    fn sorted_neighbors(&self, index: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(index, direction).collect();
        neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        neighbors.dedup();
        neighbors
    }

    pub fn latency_between(&self, from: NodeIndex, to: NodeIndex) -> f64 {
        self.graph
            .find_edge(from, to)
            .map(|edge| self.graph[edge].avg_latency_ms())
            .unwrap_or(0.0)
    }

    fn edge_record(&self, from: NodeIndex, to: NodeIndex, data: &DependencyEdge) -> EdgeRecord {
        EdgeRecord {
            caller: self.graph[from].clone(),
            callee: self.graph[to].clone(),
            weight: data.weight,
            avg_latency_ms: data.avg_latency_ms(),
            dependency_type: data.dependency_type,
            first_seen: data.first_seen,
            last_seen: data.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_observations: u64,
    pub edge_types: BTreeMap<String, usize>,
    /// Components that contain at least one cycle.
    pub strongly_connected_components: usize,
    pub avg_degree: f64,
}

impl GraphStats {
    pub fn print_summary(&self) {
        println!("Dependency Graph Analysis:");
        println!("  Services: {}", self.total_nodes);
        println!("  Dependencies: {}", self.total_edges);
        println!("  Observed calls: {}", self.total_observations);
        println!("  Average degree: {:.2}", self.avg_degree);
        println!("  Cyclic components: {}", self.strongly_connected_components);

        println!("  Dependency types:");
        for (edge_type, count) in &self.edge_types {
            println!("    {}: {}", edge_type, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 30, 10, 0, second).unwrap()
    }

    #[test]
    fn repeated_edge_accumulates_weight_and_exact_mean() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A", "B", 100, DependencyType::Http, at(1));
        let record = graph.add_dependency("A", "B", 200, DependencyType::Rpc, at(2));

        assert_eq!(record.weight, 2);
        assert_eq!(record.avg_latency_ms, 150.0);
        assert_eq!(record.dependency_type, DependencyType::Rpc);
        assert_eq!(record.first_seen, at(1));
        assert_eq!(record.last_seen, at(2));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn mean_is_exact_over_all_samples() {
        let mut graph = DependencyGraph::new();
        for latency in [10, 20, 30, 41] {
            graph.add_dependency("A", "B", latency, DependencyType::Generic, at(0));
        }
        let record = graph.edge("A", "B").unwrap();
        assert_eq!(record.weight, 4);
        assert_eq!(record.avg_latency_ms, 25.25);
    }

    #[test]
    fn nodes_are_created_for_both_endpoints() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A", "B", 5, DependencyType::Generic, at(0));
        graph.add_dependency("B", "B", 5, DependencyType::Generic, at(0));

        assert!(graph.contains("A"));
        assert!(graph.contains("B"));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn dependencies_split_into_outgoing_and_incoming() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("Web", "Auth", 5, DependencyType::Http, at(0));
        graph.add_dependency("Auth", "Db", 5, DependencyType::Database, at(0));
        graph.add_dependency("Api", "Auth", 5, DependencyType::Http, at(0));

        let deps = graph.get_dependencies("Auth");
        let outgoing: Vec<_> = deps.outgoing.iter().map(|e| e.callee.as_str()).collect();
        let incoming: Vec<_> = deps.incoming.iter().map(|e| e.caller.as_str()).collect();
        assert_eq!(outgoing, vec!["Db"]);
        assert_eq!(incoming, vec!["Api", "Web"]);

        let unknown = graph.get_dependencies("Nope");
        assert!(unknown.outgoing.is_empty() && unknown.incoming.is_empty());
    }

    #[test]
    fn snapshot_round_trip_preserves_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A", "B", 100, DependencyType::Http, at(1));
        graph.add_dependency("A", "B", 201, DependencyType::Http, at(2));
        graph.add_dependency("B", "C", 7, DependencyType::Database, at(3));

        let snapshot = graph.to_snapshot();
        assert_eq!(snapshot.nodes, vec!["A", "B", "C"]);

        let rebuilt = DependencyGraph::from_snapshot(&snapshot);
        assert_eq!(rebuilt.to_snapshot(), snapshot);
        assert_eq!(rebuilt.edge("A", "B").unwrap().avg_latency_ms, 150.5);
    }

    #[test]
    fn stats_count_cyclic_components() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A", "B", 1, DependencyType::Rpc, at(0));
        graph.add_dependency("B", "A", 1, DependencyType::Rpc, at(0));
        graph.add_dependency("C", "C", 1, DependencyType::Generic, at(0));
        graph.add_dependency("C", "D", 1, DependencyType::Http, at(0));

        let stats = graph.stats();
        assert_eq!(stats.total_nodes, 4);
        assert_eq!(stats.total_edges, 4);
        assert_eq!(stats.strongly_connected_components, 2);
        assert_eq!(stats.edge_types.get("rpc"), Some(&2));
    }
}
