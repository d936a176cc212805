pub mod analyzer;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod graph_analyzer;
pub mod impact;
pub mod log_parser;
pub mod reporter;
pub mod risk;
pub mod streaming;
pub mod ws;

pub use analyzer::TopologyAnalyzer;
pub use config::Config;
pub use dependency_graph::DependencyGraph;
pub use error::TopologyError;
pub use graph_analyzer::GraphAnalyzer;
pub use impact::ImpactSimulator;
pub use log_parser::LogEntryParser;
pub use reporter::Reporter;
pub use risk::RiskCalculator;
pub use streaming::StreamingServer;

pub type Result<T> = anyhow::Result<T>;
