use crate::error::TopologyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{env, path::PathBuf};

/// Upper bound for the risk learning window (about a century).
pub const MAX_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Traffic log to tail and replay.
    pub log_path: PathBuf,
    pub server: ServerConfig,
    pub analysis: AnalysisConfig,
    pub risk: RiskConfig,
    /// Declared criticality per service, keyed by service name.
    pub services: ServiceCatalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub poll_interval_ms: u64,
    /// Pending messages per subscriber before it is considered stalled and dropped.
    pub subscriber_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub spof_threshold: usize,
    pub critical_path_top_n: usize,
    /// Maximum number of services listed in a single SPOF alert.
    pub spof_alert_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub window_days: i64,
    /// Records required before historical multipliers are trusted.
    pub min_records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTier {
    Critical,
    High,
    Standard,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCriticality {
    pub tier: ServiceTier,
    /// Availability target, e.g. `99.95`.
    pub sla: Option<f64>,
}

pub type ServiceCatalog = BTreeMap<String, ServiceCriticality>;

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("logs/traffic.log"),
            server: ServerConfig::default(),
            analysis: AnalysisConfig::default(),
            risk: RiskConfig::default(),
            services: ServiceCatalog::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8765".to_string(),
            poll_interval_ms: 500,
            subscriber_buffer: 256,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            spof_threshold: 2,
            critical_path_top_n: 5,
            spof_alert_limit: 5,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            min_records: 5,
        }
    }
}

impl Config {
    /// Get the default config file path (~/.service-topology.toml)
    pub fn default_config_path() -> crate::Result<PathBuf> {
        let home_dir = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(PathBuf::from(home_dir).join(".service-topology.toml"))
    }

    /// Load config from the default location, falling back to defaults if the file doesn't exist
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::default_config_path()?;

        let config = if config_path.exists() {
            tracing::info!("Loading configuration from {}", config_path.display());
            Self::from_file(&config_path)?
        } else {
            tracing::info!(
                "No config file found at {}, using defaults (run 'service-topology config' to create one)",
                config_path.display()
            );
            Self::default()
        };

        config.with_env_overrides().validated()
    }

    /// Load config from a specific file path
    pub fn from_file(path: &PathBuf) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load_from(path: &PathBuf) -> crate::Result<Self> {
        Self::from_file(path)?.with_env_overrides().validated()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(log_path) = env::var("SERVICE_TOPOLOGY_LOG") {
            self.log_path = PathBuf::from(log_path);
        }
        if let Ok(bind_address) = env::var("SERVICE_TOPOLOGY_BIND") {
            self.server.bind_address = bind_address;
        }
        self
    }

    fn validated(self) -> crate::Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.server.poll_interval_ms == 0 {
            return Err(TopologyError::InvalidConfig(
                "server.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.server.subscriber_buffer == 0 {
            return Err(TopologyError::InvalidConfig(
                "server.subscriber_buffer must be greater than zero".to_string(),
            ));
        }
        if self.risk.window_days <= 0 {
            return Err(TopologyError::InvalidConfig(
                "risk.window_days must be positive".to_string(),
            ));
        }
        if self.risk.window_days > MAX_WINDOW_DAYS {
            return Err(TopologyError::InvalidConfig(format!(
                "risk.window_days must be at most {}",
                MAX_WINDOW_DAYS
            )));
        }
        Ok(())
    }

    /// Save config to a file
    pub fn to_file(&self, path: &PathBuf) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a config file with all available options documented
    pub fn create_documented_config() -> String {
        r#"# Service Topology Configuration File
# Controls how traffic logs are tailed and how the dependency graph is analysed

# Traffic log to replay on start and tail afterwards
# (override with SERVICE_TOPOLOGY_LOG)
log_path = "logs/traffic.log"

[server]
# Address for the WebSocket endpoint (override with SERVICE_TOPOLOGY_BIND)
bind_address = "127.0.0.1:8765"

# How often the log is polled for new lines, in milliseconds
poll_interval_ms = 500

# Messages queued per subscriber before a slow subscriber is dropped
subscriber_buffer = 256

[analysis]
# A service with more distinct callers than this is a single point of failure
spof_threshold = 2

# Number of critical paths returned to clients
critical_path_top_n = 5

# Services listed per single-point-of-failure alert
spof_alert_limit = 5

[risk]
# Trailing window of historical change outcomes, in days
window_days = 30

# Records needed before change-type multipliers are recomputed
min_records = 5

# Declared criticality of individual services.
# tier: "critical", "high", "standard" or "low"; sla is an availability target.
#
# [services.PaymentService]
# tier = "critical"
# sla = 99.99
#
# [services.ReportService]
# tier = "low"
"#
        .to_string()
    }
}
