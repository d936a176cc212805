use crate::dependency_graph::DependencyType;
use crate::error::TopologyError;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One caller → callee interaction extracted from a traffic log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyObservation {
    pub caller: String,
    pub callee: String,
    pub latency_ms: u64,
    pub dependency_type: DependencyType,
    pub timestamp: DateTime<Utc>,
    /// Protocol detail when the grammar carries one, e.g. `GET /api/validate`.
    pub detail: Option<String>,
}

/// Outcome of parsing a batch of lines.
#[derive(Debug, Default)]
pub struct ParseBatch {
    pub observations: Vec<DependencyObservation>,
    pub skipped: usize,
}

struct LinePattern {
    dependency_type: DependencyType,
    regex: Regex,
}

/// Recognizes the four traffic log grammars, in priority order:
///
/// ```text
/// WebApp called AuthService GET /api/validate 45ms
/// OrderService -> InventoryService.checkStock() 80ms
/// UserService -> PostgreSQL SELECT users 35ms
/// ServiceA -> ServiceB 12ms
/// ```
///
/// Each may be prefixed with `[YYYY-MM-DD HH:MM:SS]`.
pub struct LogEntryParser {
    timestamp_prefix: Regex,
    patterns: Vec<LinePattern>,
}

impl LogEntryParser {
    pub fn new() -> Result<Self, TopologyError> {
        let patterns = vec![
            LinePattern {
                dependency_type: DependencyType::Http,
                regex: Regex::new(
                    r"^(?P<caller>\S+)\s+called\s+(?P<callee>\S+)\s+(?P<method>[A-Z]+)\s+(?P<path>\S+)\s+(?P<latency>\S+)ms$",
                )?,
            },
            LinePattern {
                dependency_type: DependencyType::Rpc,
                regex: Regex::new(
                    r"^(?P<caller>\S+)\s+->\s+(?P<callee>[^\s.]+)\.(?P<method>\w+)\(\)\s+(?P<latency>\S+)ms$",
                )?,
            },
            LinePattern {
                dependency_type: DependencyType::Database,
                regex: Regex::new(
                    r"^(?P<caller>\S+)\s+->\s+(?P<callee>\S+)\s+(?P<operation>[A-Z]+)\s+(?P<table>\S+)\s+(?P<latency>\S+)ms$",
                )?,
            },
            LinePattern {
                dependency_type: DependencyType::Generic,
                regex: Regex::new(r"^(?P<caller>\S+)\s+->\s+(?P<callee>\S+)\s+(?P<latency>\S+)ms$")?,
            },
        ];

        Ok(Self {
            timestamp_prefix: Regex::new(r"^\[(?P<ts>[^\]]*)\]\s*(?P<rest>.*)$")?,
            patterns,
        })
    }

    /// Parse one raw line. Unrecognized or malformed lines yield `None`.
    pub fn parse(&self, line: &str) -> Option<DependencyObservation> {
        self.parse_at(line, Utc::now())
    }

    /// Like [`parse`](Self::parse), stamping lines without a timestamp prefix with `now`.
    pub fn parse_at(&self, line: &str, now: DateTime<Utc>) -> Option<DependencyObservation> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (timestamp, body) = match self.timestamp_prefix.captures(line) {
            Some(captures) => {
                let raw = captures.name("ts")?.as_str().trim();
                let parsed = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()?;
                (parsed.and_utc(), captures.name("rest")?.as_str())
            }
            None => (now, line),
        };

        // First grammar that matches structurally decides; a bad latency
        // rejects the line rather than falling through to a looser pattern.
        let pattern = self.patterns.iter().find(|p| p.regex.is_match(body))?;
        let captures = pattern.regex.captures(body)?;
        let latency_ms = captures.name("latency")?.as_str().parse::<u64>().ok()?;

        Some(DependencyObservation {
            caller: captures.name("caller")?.as_str().to_string(),
            callee: captures.name("callee")?.as_str().to_string(),
            latency_ms,
            dependency_type: pattern.dependency_type,
            timestamp,
            detail: Self::detail(pattern.dependency_type, &captures),
        })
    }

    /// Parse a batch of lines, counting the ones that were skipped.
    pub fn parse_lines<'a, I>(&self, lines: I) -> ParseBatch
    where
        I: IntoIterator<Item = &'a str>,
    {
        let now = Utc::now();
        let mut batch = ParseBatch::default();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_at(line, now) {
                Some(observation) => batch.observations.push(observation),
                None => batch.skipped += 1,
            }
        }
        batch
    }

    /// Parse raw log bytes line by line. A line that is not valid UTF-8 is
    /// skipped on its own without affecting its neighbours.
    pub fn parse_bytes(&self, bytes: &[u8]) -> ParseBatch {
        let now = Utc::now();
        let mut batch = ParseBatch::default();
        for line in split_lines(bytes) {
            match line.and_then(|line| self.parse_at(line, now)) {
                Some(observation) => batch.observations.push(observation),
                None => batch.skipped += 1,
            }
        }
        batch
    }

    fn detail(dependency_type: DependencyType, captures: &Captures<'_>) -> Option<String> {
        match dependency_type {
            DependencyType::Http => Some(format!(
                "{} {}",
                captures.name("method")?.as_str(),
                captures.name("path")?.as_str()
            )),
            DependencyType::Rpc => Some(captures.name("method")?.as_str().to_string()),
            DependencyType::Database => Some(format!(
                "{} {}",
                captures.name("operation")?.as_str(),
                captures.name("table")?.as_str()
            )),
            DependencyType::Generic => None,
        }
    }
}

/// Split raw log bytes on `\n`, decoding each line separately. Lines that are
/// not valid UTF-8 come back as `None`; blank lines are dropped.
pub fn split_lines(bytes: &[u8]) -> impl Iterator<Item = Option<&str>> + '_ {
    bytes
        .split(|&b| b == b'\n')
        .map(|raw| std::str::from_utf8(raw).ok())
        .filter(|line| line.map_or(true, |line| !line.trim().is_empty()))
}
