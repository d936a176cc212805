use crate::analyzer::TopologyAnalysis;
use crate::impact::Severity;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub executive_summary: ExecutiveSummary,
    pub analysis: TopologyAnalysis,
    pub recommendations: Vec<PrioritizedRecommendation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub log_path: String,
    pub analysis_duration_ms: u128,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub overview: String,
    pub key_findings: Vec<String>,
    pub critical_issues: Vec<String>,
    /// 0-10, higher is healthier.
    pub resilience_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrioritizedRecommendation {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: String,
    pub affected_services: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
    All,
}

#[derive(Default)]
pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_report(&self, analysis: TopologyAnalysis, log_path: &Path, duration_ms: u128) -> Report {
        let metadata = ReportMetadata {
            generated_at: chrono::Utc::now().to_rfc3339(),
            log_path: log_path.display().to_string(),
            analysis_duration_ms: duration_ms,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let executive_summary = self.create_executive_summary(&analysis);
        let recommendations = self.prioritize_recommendations(&analysis);

        Report {
            metadata,
            executive_summary,
            analysis,
            recommendations,
        }
    }

    fn create_executive_summary(&self, analysis: &TopologyAnalysis) -> ExecutiveSummary {
        let stats = &analysis.stats;
        let overview = format!(
            "{} services connected by {} dependencies, built from {} observed calls.",
            stats.total_nodes, stats.total_edges, stats.total_observations
        );

        let mut key_findings = Vec::new();
        if let Some(path) = analysis.critical_paths.first() {
            key_findings.push(format!(
                "Longest dependency chain spans {} services ({:.1}ms): {}",
                path.path.len(),
                path.latency,
                path.path.join(" → ")
            ));
        }
        if let Some(worst) = analysis.failure_ranking.first().filter(|r| r.blast_radius > 0) {
            key_findings.push(format!(
                "A failure of {} would impact {} services",
                worst.target, worst.blast_radius
            ));
        }

        let mut critical_issues = Vec::new();
        if !analysis.cycles.is_empty() {
            critical_issues.push(format!("{} circular dependencies detected", analysis.cycles.len()));
        }
        for spof in &analysis.single_points_of_failure {
            critical_issues.push(format!(
                "{} is a single point of failure for {} callers",
                spof.service, spof.in_degree
            ));
        }

        ExecutiveSummary {
            overview,
            key_findings,
            critical_issues,
            resilience_score: self.calculate_resilience_score(analysis),
        }
    }

    fn calculate_resilience_score(&self, analysis: &TopologyAnalysis) -> f64 {
        if analysis.stats.total_nodes == 0 {
            return 10.0;
        }

        let cycle_penalty = (analysis.stats.strongly_connected_components as f64 * 1.5).min(4.0);
        let spof_penalty = (analysis.single_points_of_failure.len() as f64).min(3.0);
        let coupling_penalty = (analysis.stats.avg_degree * 0.5).min(3.0);

        (10.0 - cycle_penalty - spof_penalty - coupling_penalty).max(0.0)
    }

    fn prioritize_recommendations(&self, analysis: &TopologyAnalysis) -> Vec<PrioritizedRecommendation> {
        let mut recommendations = Vec::new();

        for cycle in &analysis.cycles {
            recommendations.push(PrioritizedRecommendation {
                title: "Break circular dependency".to_string(),
                description: format!(
                    "{} form a call cycle; a slowdown anywhere in it feeds back on itself",
                    cycle.join(" → ")
                ),
                priority: Priority::High,
                category: "Cycles".to_string(),
                affected_services: cycle.clone(),
            });
        }

        for spof in &analysis.single_points_of_failure {
            recommendations.push(PrioritizedRecommendation {
                title: format!("Add redundancy for {}", spof.service),
                description: format!(
                    "{} distinct services call {}; add replicas, caching or circuit breakers",
                    spof.in_degree, spof.service
                ),
                priority: if spof.in_degree > 5 { Priority::Critical } else { Priority::High },
                category: "Single point of failure".to_string(),
                affected_services: vec![spof.service.clone()],
            });
        }

        for result in analysis
            .failure_ranking
            .iter()
            .filter(|r| r.severity >= Severity::High)
        {
            recommendations.push(PrioritizedRecommendation {
                title: format!("Contain the blast radius of {}", result.target),
                description: format!(
                    "A failure would cascade to {} services ({} severity)",
                    result.blast_radius, result.severity
                ),
                priority: if result.severity == Severity::Critical {
                    Priority::Critical
                } else {
                    Priority::Medium
                },
                category: "Blast radius".to_string(),
                affected_services: result.affected_services.clone(),
            });
        }

        if let Some(path) = analysis.critical_paths.first().filter(|p| p.path.len() > 4) {
            recommendations.push(PrioritizedRecommendation {
                title: "Shorten the critical path".to_string(),
                description: format!(
                    "A {}-hop synchronous chain adds {:.1}ms end to end; consider async hand-offs",
                    path.path.len() - 1,
                    path.latency
                ),
                priority: Priority::Low,
                category: "Latency".to_string(),
                affected_services: path.path.clone(),
            });
        }

        recommendations.sort_by_key(|r| r.priority);
        recommendations
    }

    pub fn export_report(&self, report: &Report, output_dir: &PathBuf, format: ReportFormat) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)?;
        let mut exported_files = Vec::new();

        if matches!(format, ReportFormat::Json | ReportFormat::All) {
            let json_path = output_dir.join("topology_report.json");
            fs::write(&json_path, serde_json::to_string_pretty(report)?)?;
            exported_files.push(json_path);
        }

        if matches!(format, ReportFormat::Markdown | ReportFormat::All) {
            let md_path = output_dir.join("topology_summary.md");
            fs::write(&md_path, self.generate_markdown_summary(report))?;
            exported_files.push(md_path);
        }

        Ok(exported_files)
    }

    fn generate_markdown_summary(&self, report: &Report) -> String {
        let mut md = format!(
            "# Service Topology Summary\n\n**Log:** {}\n**Generated:** {}\n**Analysis Duration:** {}ms\n\n",
            report.metadata.log_path, report.metadata.generated_at, report.metadata.analysis_duration_ms
        );

        md.push_str("## Executive Summary\n\n");
        md.push_str(&format!("{}\n\n", report.executive_summary.overview));
        md.push_str(&format!(
            "- **Resilience Score:** {:.2}/10\n",
            report.executive_summary.resilience_score
        ));
        for finding in &report.executive_summary.key_findings {
            md.push_str(&format!("- {}\n", finding));
        }
        for issue in &report.executive_summary.critical_issues {
            md.push_str(&format!("- ⚠️ {}\n", issue));
        }
        md.push('\n');

        md.push_str("## Critical Paths\n\n| Path | Latency (ms) |\n|---|---|\n");
        for path in &report.analysis.critical_paths {
            md.push_str(&format!("| {} | {:.1} |\n", path.path.join(" → "), path.latency));
        }
        md.push('\n');

        md.push_str("## Failure Impact\n\n| Service | Blast Radius | Severity |\n|---|---|---|\n");
        for result in report.analysis.failure_ranking.iter().take(10) {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                result.target, result.blast_radius, result.severity
            ));
        }
        md.push('\n');

        md.push_str("## Top Recommendations\n\n");
        for (i, rec) in report.recommendations.iter().take(5).enumerate() {
            md.push_str(&format!(
                "{}. **{}** (Priority: {:?})\n   {}\n\n",
                i + 1,
                rec.title,
                rec.priority,
                rec.description
            ));
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{LogSummary, TopologyAnalyzer};
    use crate::config::Config;
    use crate::dependency_graph::{DependencyGraph, DependencyType};
    use chrono::Utc;

    fn cyclic_analysis() -> TopologyAnalysis {
        let mut graph = DependencyGraph::new();
        for (caller, callee) in [("A", "B"), ("B", "A"), ("C", "Hub"), ("D", "Hub"), ("E", "Hub")] {
            graph.add_dependency(caller, callee, 10, DependencyType::Rpc, Utc::now());
        }
        TopologyAnalyzer::new(Config::default())
            .unwrap()
            .analyze_graph(&graph, LogSummary::default())
    }

    #[test]
    fn report_flags_cycles_and_spofs() {
        let report = Reporter::new().generate_report(cyclic_analysis(), Path::new("traffic.log"), 3);

        assert_eq!(report.executive_summary.critical_issues.len(), 2);
        assert!(report.executive_summary.resilience_score < 10.0);
        assert_eq!(report.recommendations[0].priority, Priority::High);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.title == "Add redundancy for Hub"));
    }

    #[test]
    fn exports_requested_formats() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let reporter = Reporter::new();
        let report = reporter.generate_report(cyclic_analysis(), Path::new("traffic.log"), 3);

        let files = reporter.export_report(&report, &output, ReportFormat::All).unwrap();
        assert_eq!(files.len(), 2);
        let markdown = fs::read_to_string(output.join("topology_summary.md")).unwrap();
        assert!(markdown.contains("## Critical Paths"));

        let json_only = reporter.export_report(&report, &output, ReportFormat::Json).unwrap();
        assert_eq!(json_only, vec![output.join("topology_report.json")]);
    }
}
