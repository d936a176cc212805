//! Failure and change impact simulation.
//!
//! Two directions are modelled separately:
//!
//! * **blast radius** walks *upstream*: if a service fails, every caller that
//!   reaches it, directly or transitively, is impacted;
//! * **dependency depth** walks *downstream*: a change to a service's contract
//!   may affect everything it calls.

use crate::config::{ServiceCatalog, ServiceCriticality, ServiceTier};
use crate::dependency_graph::DependencyGraph;
use crate::error::TopologyError;
use crate::graph_analyzer::{GraphAnalyzer, DEFAULT_CRITICAL_PATH_COUNT};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Structural score of a critical-tier service on a critical path with
/// saturated reach and depth.
const MAX_STRUCTURAL_SCORE: f64 = 105.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    ApiModification,
    SchemaChange,
    Infrastructure,
    Configuration,
}

impl ChangeType {
    pub const ALL: [ChangeType; 4] = [
        ChangeType::ApiModification,
        ChangeType::SchemaChange,
        ChangeType::Infrastructure,
        ChangeType::Configuration,
    ];

    pub const MAX_MULTIPLIER: f64 = 1.5;

    /// Relative riskiness of a change type, applied to the structural score.
    pub fn risk_multiplier(self) -> f64 {
        match self {
            ChangeType::SchemaChange => 1.5,
            ChangeType::Infrastructure => 1.4,
            ChangeType::ApiModification => 1.2,
            ChangeType::Configuration => 0.8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::ApiModification => "api_modification",
            ChangeType::SchemaChange => "schema_change",
            ChangeType::Infrastructure => "infrastructure",
            ChangeType::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeType::ALL
            .into_iter()
            .find(|change_type| change_type.as_str() == s)
            .ok_or_else(|| TopologyError::UnknownChangeType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_impact_count(count: usize) -> Self {
        match count {
            0 => Severity::None,
            1..=2 => Severity::Low,
            3..=5 => Severity::Medium,
            6..=10 => Severity::High,
            _ => Severity::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub target: String,
    /// Services that transitively call `target`, sorted by name.
    pub affected_services: Vec<String>,
    pub blast_radius: usize,
    pub severity: Severity,
    /// Hop distance of every service `target` transitively calls.
    pub dependency_depth: BTreeMap<String, usize>,
    pub on_critical_path: bool,
}

/// A proposed change to evaluate before it ships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeProposal {
    pub change_type: ChangeType,
    pub target_service: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub proposer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 60.0 {
            RiskLevel::High
        } else if score >= 30.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeAssessment {
    pub target: String,
    pub change_type: ChangeType,
    /// Structural risk on a 0-100 scale, before any historical adjustment.
    pub base_risk: f64,
    pub risk_level: RiskLevel,
    pub dependency_depth: BTreeMap<String, usize>,
    pub max_depth: usize,
    pub upstream_blast_radius: usize,
    pub on_critical_path: bool,
    pub criticality: Option<ServiceCriticality>,
    pub recommendations: Vec<String>,
}

pub struct ImpactSimulator<'a> {
    graph: &'a DependencyGraph,
    catalog: &'a ServiceCatalog,
    critical_services: HashSet<String>,
}

impl<'a> ImpactSimulator<'a> {
    pub fn new(graph: &'a DependencyGraph, catalog: &'a ServiceCatalog) -> Self {
        Self::with_critical_path_count(graph, catalog, DEFAULT_CRITICAL_PATH_COUNT)
    }

    pub fn with_critical_path_count(
        graph: &'a DependencyGraph,
        catalog: &'a ServiceCatalog,
        critical_path_top_n: usize,
    ) -> Self {
        let critical_services = GraphAnalyzer::new(graph)
            .critical_paths(critical_path_top_n)
            .into_iter()
            .flat_map(|path| path.path)
            .collect();
        Self {
            graph,
            catalog,
            critical_services,
        }
    }

    /// Blast radius of `service` failing. The failed service itself is not
    /// counted, even when it sits on a cycle.
    pub fn simulate_failure(&self, service: &str) -> ImpactResult {
        let mut affected: Vec<String> = match self.graph.index_of(service) {
            Some(start) => self
                .reachable(start, |node| self.graph.predecessors(node))
                .into_keys()
                .map(|node| self.graph.name(node).to_string())
                .collect(),
            None => Vec::new(),
        };
        affected.sort_unstable();

        ImpactResult {
            target: service.to_string(),
            blast_radius: affected.len(),
            severity: Severity::from_impact_count(affected.len()),
            affected_services: affected,
            dependency_depth: self.dependency_depth(service),
            on_critical_path: self.critical_services.contains(service),
        }
    }

    /// Failure impact of every service, most disruptive first.
    pub fn analyze_all_failures(&self) -> Vec<ImpactResult> {
        let services = self.graph.services();
        let mut results: Vec<ImpactResult> = services
            .par_iter()
            .map(|service| self.simulate_failure(service))
            .collect();

        results.sort_by(|a, b| {
            b.blast_radius
                .cmp(&a.blast_radius)
                .then_with(|| a.target.cmp(&b.target))
        });
        results
    }

    /// Downstream hop distance from `target` to every service it reaches.
    pub fn dependency_depth(&self, target: &str) -> BTreeMap<String, usize> {
        let Some(start) = self.graph.index_of(target) else {
            return BTreeMap::new();
        };
        self.reachable(start, |node| self.graph.successors(node))
            .into_iter()
            .map(|(node, depth)| (self.graph.name(node).to_string(), depth))
            .collect()
    }

    /// Structural risk of a proposed change.
    ///
    /// The score grows with the number of services reachable in either
    /// direction, with chain depth, critical-path membership and the declared
    /// tier, and is scaled by the change type's multiplier.
    pub fn analyze_change(&self, proposal: &ChangeProposal) -> ChangeAssessment {
        let target = proposal.target_service.as_str();
        let dependency_depth = self.dependency_depth(target);
        let max_depth = dependency_depth.values().copied().max().unwrap_or(0);
        let upstream_blast_radius = self.simulate_failure(target).blast_radius;
        let on_critical_path = self.critical_services.contains(target);
        let criticality = self.catalog.get(target).cloned();

        let reach = dependency_depth.len() + upstream_blast_radius;
        let mut score = 10.0;
        score += (reach as f64 * 5.0).min(40.0);
        score += (max_depth as f64 * 5.0).min(15.0);
        if on_critical_path {
            score += 15.0;
        }
        score += criticality_weight(criticality.as_ref());

        // Scaled so the largest multiplier lands exactly on 100 at saturation.
        let structural =
            score.min(MAX_STRUCTURAL_SCORE) / MAX_STRUCTURAL_SCORE * (100.0 / ChangeType::MAX_MULTIPLIER);
        let base_risk = round2((structural * proposal.change_type.risk_multiplier()).min(100.0));
        let risk_level = RiskLevel::from_score(base_risk);

        let mut recommendations = Vec::new();
        if upstream_blast_radius > 5 {
            recommendations.push(format!(
                "{} callers depend on {}; stage the rollout behind a feature flag",
                upstream_blast_radius, target
            ));
        }
        if dependency_depth.len() > 5 {
            recommendations.push(format!(
                "Change reaches {} downstream services; run contract tests before deploying",
                dependency_depth.len()
            ));
        }
        if on_critical_path {
            recommendations.push(format!("{} is on a critical path; monitor latency closely after deploy", target));
        }
        if proposal.change_type == ChangeType::SchemaChange {
            recommendations.push("Ship the schema change backward compatible and migrate readers first".to_string());
        }
        if matches!(risk_level, RiskLevel::High | RiskLevel::Critical) {
            recommendations.push("Schedule outside peak hours with a tested rollback plan".to_string());
        }

        ChangeAssessment {
            target: target.to_string(),
            change_type: proposal.change_type,
            base_risk,
            risk_level,
            dependency_depth,
            max_depth,
            upstream_blast_radius,
            on_critical_path,
            criticality,
            recommendations,
        }
    }

    /// Breadth-first closure from `start`, returning hop distance per reached
    /// node. `start` is never included.
    fn reachable<F>(&self, start: NodeIndex, neighbors: F) -> BTreeMap<NodeIndex, usize>
    where
        F: Fn(NodeIndex) -> Vec<NodeIndex>,
    {
        let mut seen = HashSet::from([start]);
        let mut depth = BTreeMap::new();
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((node, hops)) = queue.pop_front() {
            for next in neighbors(node) {
                if seen.insert(next) {
                    depth.insert(next, hops + 1);
                    queue.push_back((next, hops + 1));
                }
            }
        }

        depth
    }
}

fn criticality_weight(criticality: Option<&ServiceCriticality>) -> f64 {
    let Some(criticality) = criticality else {
        return 6.0;
    };
    let tier = match criticality.tier {
        ServiceTier::Critical => 20.0,
        ServiceTier::High => 12.0,
        ServiceTier::Standard => 6.0,
        ServiceTier::Low => 0.0,
    };
    let sla = match criticality.sla {
        Some(sla) if sla >= 99.99 => 5.0,
        Some(sla) if sla >= 99.9 => 3.0,
        _ => 0.0,
    };
    tier + sla
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
