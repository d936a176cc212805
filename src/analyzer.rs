use crate::{
    config::Config,
    dependency_graph::{DependencyGraph, GraphStats},
    graph_analyzer::{CriticalPath, GraphAnalyzer, SinglePointOfFailure},
    impact::{ImpactResult, ImpactSimulator},
    log_parser::{split_lines, DependencyObservation, LogEntryParser},
};
use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Offline analysis of a traffic log: replay it into a fresh graph and run
/// every structural pass once.
pub struct TopologyAnalyzer {
    config: Config,
    parser: LogEntryParser,
}

impl TopologyAnalyzer {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            parser: LogEntryParser::new()?,
        })
    }

    pub fn build_graph(&self, log_path: &Path) -> Result<(DependencyGraph, LogSummary)> {
        let content = std::fs::read(log_path)
            .with_context(|| format!("reading traffic log {}", log_path.display()))?;
        let lines: Vec<Option<&str>> = split_lines(&content).collect();

        let observations = self.parse_lines_parallel(&lines);
        let summary = LogSummary {
            total_lines: lines.len(),
            parsed_lines: observations.len(),
            skipped_lines: lines.len() - observations.len(),
        };

        // Applied in log order so last-seen times and dependency types reflect the latest line.
        let mut graph = DependencyGraph::new();
        for observation in &observations {
            graph.record(observation);
        }

        tracing::info!(
            parsed = summary.parsed_lines,
            skipped = summary.skipped_lines,
            services = graph.node_count(),
            "Built dependency graph from {}",
            log_path.display()
        );
        Ok((graph, summary))
    }

    /// Lines that are not valid UTF-8 arrive as `None` and count as skipped.
    fn parse_lines_parallel(&self, lines: &[Option<&str>]) -> Vec<DependencyObservation> {
        let now = Utc::now();
        lines
            .par_iter()
            .filter_map(|&line| line.and_then(|line| self.parser.parse_at(line, now)))
            .collect()
    }

    pub fn analyze_log(&self, log_path: &Path) -> Result<TopologyAnalysis> {
        let (graph, log_summary) = self.build_graph(log_path)?;
        Ok(self.analyze_graph(&graph, log_summary))
    }

    pub fn analyze_graph(&self, graph: &DependencyGraph, log_summary: LogSummary) -> TopologyAnalysis {
        let analysis = &self.config.analysis;
        let analyzer = GraphAnalyzer::new(graph);
        let simulator = ImpactSimulator::with_critical_path_count(
            graph,
            &self.config.services,
            analysis.critical_path_top_n,
        );

        TopologyAnalysis {
            log_summary,
            stats: graph.stats(),
            cycles: analyzer.find_cycles(),
            single_points_of_failure: analyzer.find_single_points_of_failure(analysis.spof_threshold),
            critical_paths: analyzer.critical_paths(analysis.critical_path_top_n),
            failure_ranking: simulator.analyze_all_failures(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSummary {
    pub total_lines: usize,
    pub parsed_lines: usize,
    pub skipped_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyAnalysis {
    pub log_summary: LogSummary,
    pub stats: GraphStats,
    pub cycles: Vec<Vec<String>>,
    pub single_points_of_failure: Vec<SinglePointOfFailure>,
    pub critical_paths: Vec<CriticalPath>,
    pub failure_ranking: Vec<ImpactResult>,
}

impl TopologyAnalysis {
    pub fn print_summary(&self) {
        println!("📊 Topology Analysis Summary");
        println!("============================");

        println!("\n📜 Log:");
        println!("  Lines: {}", self.log_summary.total_lines);
        println!("  Parsed: {}", self.log_summary.parsed_lines);
        println!("  Skipped: {}", self.log_summary.skipped_lines);

        println!("\n🔗 Dependencies:");
        self.stats.print_summary();

        println!("\n🔁 Cycles: {}", self.cycles.len());
        for cycle in self.cycles.iter().take(5) {
            println!("    {}", cycle.join(" → "));
        }

        println!("\n⚠️  Single points of failure: {}", self.single_points_of_failure.len());
        for spof in &self.single_points_of_failure {
            println!("    {} ({} callers)", spof.service, spof.in_degree);
        }

        println!("\n🛤️  Critical paths:");
        for path in &self.critical_paths {
            println!("    {} ({:.1}ms)", path.path.join(" → "), path.latency);
        }

        println!("\n💥 Largest blast radius:");
        for result in self.failure_ranking.iter().take(5) {
            println!("    {}: {} services ({})", result.target, result.blast_radius, result.severity);
        }
    }

    pub fn export_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzes_log_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        std::fs::write(
            &path,
            "[2025-01-30 10:00:01] WebApp called AuthService GET /api/validate 45ms\n\
             [2025-01-30 10:00:02] Mobile called AuthService GET /api/validate 55ms\n\
             [2025-01-30 10:00:03] Admin called AuthService POST /api/login 70ms\n\
             [2025-01-30 10:00:04] AuthService -> PostgreSQL SELECT users 35ms\n\
             this line is noise\n",
        )
        .unwrap();

        let analysis = TopologyAnalyzer::new(Config::default())
            .unwrap()
            .analyze_log(&path)
            .unwrap();

        assert_eq!(analysis.log_summary.parsed_lines, 4);
        assert_eq!(analysis.log_summary.skipped_lines, 1);
        assert_eq!(analysis.stats.total_nodes, 5);
        assert!(analysis.cycles.is_empty());
        assert_eq!(analysis.single_points_of_failure[0].service, "AuthService");
        assert_eq!(analysis.failure_ranking[0].target, "PostgreSQL");
        assert_eq!(analysis.failure_ranking[0].blast_radius, 4);
        assert!(analysis.export_to_json().unwrap().contains("\"critical_paths\""));
    }

    #[test]
    fn invalid_utf8_line_does_not_reject_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        std::fs::write(&path, b"A -> B 1ms\n\xff\xfe garbage\nB -> C 2ms\n").unwrap();

        let (graph, summary) = TopologyAnalyzer::new(Config::default())
            .unwrap()
            .build_graph(&path)
            .unwrap();

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(summary.total_lines, 3);
        assert_eq!(summary.parsed_lines, 2);
        assert_eq!(summary.skipped_lines, 1);
    }

    #[test]
    fn missing_log_is_an_error_offline() {
        let analyzer = TopologyAnalyzer::new(Config::default()).unwrap();
        assert!(analyzer.analyze_log(Path::new("/definitely/not/here.log")).is_err());
    }
}
