use crate::config::RiskConfig;
use crate::error::TopologyError;
use crate::impact::{round2, ChangeAssessment, ChangeProposal, ChangeType, ImpactSimulator};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const HIGH_INCIDENT_RATE: f64 = 0.3;
const LOW_INCIDENT_RATE: f64 = 0.1;
const TREND_INCIDENT_RATE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOutcome {
    Success,
    MinorIssue,
    MajorIncident,
}

impl ChangeOutcome {
    pub fn is_incident(self) -> bool {
        self != ChangeOutcome::Success
    }
}

impl FromStr for ChangeOutcome {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ChangeOutcome::Success),
            "minor_issue" => Ok(ChangeOutcome::MinorIssue),
            "major_incident" => Ok(ChangeOutcome::MajorIncident),
            other => Err(TopologyError::UnknownOutcome(other.to_string())),
        }
    }
}

/// Real-world outcome of a past change, recorded by an external process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalChange {
    pub service: String,
    pub change_type: ChangeType,
    pub predicted_risk: f64,
    pub actual_outcome: ChangeOutcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    InsufficientData,
    Increasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trend::InsufficientData => "insufficient_data",
            Trend::Increasing => "increasing",
            Trend::Stable => "stable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskTrend {
    pub service: String,
    pub trend: Trend,
    pub total_changes: usize,
    pub incident_rate: Option<f64>,
    pub recommendation: String,
}

/// Structural assessment combined with historical learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub assessment: ChangeAssessment,
    pub multiplier: f64,
    pub adjusted_risk: f64,
    pub trend: RiskTrend,
}

/// Learns per-change-type risk multipliers from recent outcomes.
///
/// The history is append-only. Records older than the window are ignored
/// when multipliers or trends are computed, never deleted.
#[derive(Debug, Clone)]
pub struct RiskCalculator {
    history: Vec<HistoricalChange>,
    multipliers: HashMap<ChangeType, f64>,
    window: Duration,
    min_records: usize,
}

impl Default for RiskCalculator {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}

impl RiskCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self {
            history: Vec::new(),
            multipliers: HashMap::new(),
            window: Duration::try_days(config.window_days).unwrap_or(Duration::MAX),
            min_records: config.min_records,
        }
    }

    /// Read a JSON array of historical records.
    pub fn load_history(path: &Path) -> crate::Result<Vec<HistoricalChange>> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<HistoricalChange> = serde_json::from_str(&content)?;
        Ok(records)
    }

    pub fn with_history(mut self, records: impl IntoIterator<Item = HistoricalChange>) -> Self {
        self.history.extend(records);
        self.recompute(Utc::now());
        self
    }

    pub fn history(&self) -> &[HistoricalChange] {
        &self.history
    }

    pub fn add_historical_data(&mut self, record: HistoricalChange) {
        self.add_historical_data_at(record, Utc::now());
    }

    pub fn add_historical_data_at(&mut self, record: HistoricalChange, now: DateTime<Utc>) {
        tracing::debug!(
            service = %record.service,
            change_type = %record.change_type,
            outcome = ?record.actual_outcome,
            "Recorded change outcome"
        );
        self.history.push(record);
        self.recompute(now);
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        if self.history.len() < self.min_records {
            return;
        }

        let cutoff = window_start(now, self.window);
        let mut counts: HashMap<ChangeType, (usize, usize)> = HashMap::new();
        for record in self.history.iter().filter(|r| r.timestamp >= cutoff) {
            let (total, incidents) = counts.entry(record.change_type).or_default();
            *total += 1;
            if record.actual_outcome.is_incident() {
                *incidents += 1;
            }
        }

        self.multipliers = counts
            .into_iter()
            .filter(|(_, (total, _))| *total > 0)
            .map(|(change_type, (total, incidents))| {
                let incident_rate = incidents as f64 / total as f64;
                let multiplier = if incident_rate > HIGH_INCIDENT_RATE {
                    1.3
                } else if incident_rate < LOW_INCIDENT_RATE {
                    0.8
                } else {
                    1.0
                };
                (change_type, multiplier)
            })
            .collect();
    }

    pub fn multiplier(&self, change_type: ChangeType) -> f64 {
        self.multipliers.get(&change_type).copied().unwrap_or(1.0)
    }

    pub fn get_adjusted_risk(&self, base_risk: f64, change_type: ChangeType) -> f64 {
        round2((base_risk * self.multiplier(change_type)).min(100.0))
    }

    pub fn get_risk_trend(&self, service: &str, days: i64) -> RiskTrend {
        self.get_risk_trend_at(service, days, Utc::now())
    }

    pub fn get_risk_trend_at(&self, service: &str, days: i64, now: DateTime<Utc>) -> RiskTrend {
        let cutoff = Duration::try_days(days)
            .map(|window| window_start(now, window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let recent: Vec<&HistoricalChange> = self
            .history
            .iter()
            .filter(|r| r.service == service && r.timestamp >= cutoff)
            .collect();

        if recent.is_empty() {
            return RiskTrend {
                service: service.to_string(),
                trend: Trend::InsufficientData,
                total_changes: 0,
                incident_rate: None,
                recommendation: "Not enough recent changes to establish a trend".to_string(),
            };
        }

        let incidents = recent.iter().filter(|r| r.actual_outcome.is_incident()).count();
        let incident_rate = incidents as f64 / recent.len() as f64;
        let (trend, recommendation) = if incident_rate > TREND_INCIDENT_RATE {
            (
                Trend::Increasing,
                "Incident rate is elevated; require extra review and staged rollouts",
            )
        } else {
            (Trend::Stable, "Recent changes are landing cleanly; standard review is sufficient")
        };

        RiskTrend {
            service: service.to_string(),
            trend,
            total_changes: recent.len(),
            incident_rate: Some(round2(incident_rate)),
            recommendation: recommendation.to_string(),
        }
    }

    /// Score `proposal` against the live graph, then apply what history says
    /// about changes of the same type.
    pub fn assess(&self, proposal: &ChangeProposal, simulator: &ImpactSimulator<'_>) -> RiskAssessment {
        let assessment = simulator.analyze_change(proposal);
        let multiplier = self.multiplier(proposal.change_type);
        let adjusted_risk = self.get_adjusted_risk(assessment.base_risk, proposal.change_type);
        let trend = self.get_risk_trend(&proposal.target_service, self.window.num_days());
        RiskAssessment {
            assessment,
            multiplier,
            adjusted_risk,
            trend,
        }
    }
}

/// Earliest timestamp inside a trailing window; windows reaching past the
/// representable range cover all history.
fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
