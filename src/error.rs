use thiserror::Error;

/// Domain errors surfaced by the topology engine.
///
/// I/O and serialization failures at the edges travel as `anyhow::Error`;
/// this enum covers the cases callers may want to match on.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("unknown change type '{0}' (expected api_modification, schema_change, infrastructure or configuration)")]
    UnknownChangeType(String),

    #[error("unknown change outcome '{0}' (expected success, minor_issue or major_incident)")]
    UnknownOutcome(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("log pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}
