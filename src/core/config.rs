//! Configuration management for docgrid
//!
//! Every section has defaults; a TOML file replaces them and `DOCGRID_*`
//! environment variables override single values on top.

use crate::core::error::{Error, Result};
use crate::maintenance::MaintenancePriority;
use docgrid_core::serialization::SerializerOptions;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "docgrid.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Merge and bucket ownership settings
    pub distributor: DistributorConfig,

    /// Maintenance scheduling
    pub maintenance: MaintenanceConfig,

    /// Document types and codec settings
    pub document: DocumentConfig,

    /// Metrics and monitoring
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Distributor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Number of replicas every bucket should have
    pub redundancy: u16,

    /// Largest node list sent in one merge
    pub max_nodes_per_merge: usize,

    /// Let merges run unordered when every node supports it
    pub use_unordered_merge_chaining: bool,

    /// Numeric ceiling for priorities of deletes issued after a merge
    pub max_feed_priority: u8,

    /// How long a node stays busy after answering busy
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub busy_node_duration: Duration,
}

/// Maintenance scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Buckets handed to operation starters per scheduler tick
    pub max_starts_per_tick: usize,

    /// Message priorities per maintenance priority
    pub priorities: PriorityConfig,
}

/// Message priority (lower is more urgent) for each maintenance priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Highest
    pub highest: u8,
    /// Very high
    pub very_high: u8,
    /// High
    pub high: u8,
    /// Medium
    pub medium: u8,
    /// Low
    pub low: u8,
    /// Very low
    pub very_low: u8,
}

/// Document type configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Document types config file (JSON or TOML); builtins only when unset
    pub documenttypes: Option<PathBuf>,

    /// Serializer settings
    pub serializer: SerializerOptions,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Register metrics on the global registry at startup
    pub enable_prometheus: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (compact, pretty)
    pub format: String,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            redundancy: 3,
            max_nodes_per_merge: 16,
            use_unordered_merge_chaining: false,
            max_feed_priority: 120,
            busy_node_duration: Duration::from_secs(60),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            max_starts_per_tick: 8,
            priorities: PriorityConfig::default(),
        }
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            highest: 50,
            very_high: 100,
            high: 120,
            medium: 140,
            low: 170,
            very_low: 200,
        }
    }
}

impl PriorityConfig {
    /// Message priority for a maintenance priority; `None` when no maintenance is needed
    pub fn message_priority(&self, priority: MaintenancePriority) -> Option<u8> {
        match priority {
            MaintenancePriority::NoMaintenanceNeeded => None,
            MaintenancePriority::VeryLow => Some(self.very_low),
            MaintenancePriority::Low => Some(self.low),
            MaintenancePriority::Medium => Some(self.medium),
            MaintenancePriority::High => Some(self.high),
            MaintenancePriority::VeryHigh => Some(self.very_high),
            MaintenancePriority::Highest => Some(self.highest),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enable_prometheus: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default file (if present) and environment variables
    pub fn load() -> Result<Self> {
        let mut config = match Self::from_file(DEFAULT_CONFIG_FILE) {
            Ok(config) => config,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(redundancy) = var("DOCGRID_REDUNDANCY") {
            self.distributor.redundancy = redundancy
                .parse()
                .map_err(|e| Error::config(format!("Invalid redundancy: {}", e)))?;
        }

        if let Some(max_nodes) = var("DOCGRID_MAX_NODES_PER_MERGE") {
            self.distributor.max_nodes_per_merge = max_nodes
                .parse()
                .map_err(|e| Error::config(format!("Invalid max nodes per merge: {}", e)))?;
        }

        if let Some(unordered) = var("DOCGRID_UNORDERED_MERGE_CHAINING") {
            self.distributor.use_unordered_merge_chaining = unordered
                .parse()
                .map_err(|e| Error::config(format!("Invalid unordered merge chaining flag: {}", e)))?;
        }

        if let Some(busy) = var("DOCGRID_BUSY_NODE_DURATION") {
            self.distributor.busy_node_duration =
                parse_duration(&busy).map_err(|e| Error::config(format!("Invalid busy node duration: {}", e)))?;
        }

        if let Some(path) = var("DOCGRID_DOCUMENTTYPES") {
            self.document.documenttypes = Some(PathBuf::from(path));
        }

        if let Some(level) = var("DOCGRID_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = var("DOCGRID_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.distributor.redundancy == 0 {
            return Err(Error::config("Redundancy must be at least 1"));
        }

        if self.distributor.max_nodes_per_merge < 2 {
            return Err(Error::config("A merge needs at least 2 nodes"));
        }

        if self.maintenance.max_starts_per_tick == 0 {
            return Err(Error::config("Scheduler must be allowed to start at least one operation per tick"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        match self.logging.format.as_str() {
            "compact" | "pretty" => {}
            _ => return Err(Error::config("Invalid log format")),
        }

        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration string like '30s' or '5m'")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Duration, E>
        where
            E: de::Error,
        {
            parse_duration(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_str(DurationVisitor)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if duration.subsec_millis() == 0 {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    } else {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }
}

// Simple duration parser for common formats
fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    if let Some(ms) = s.strip_suffix("ms") {
        let ms: u64 = ms.parse().map_err(|_| "Invalid milliseconds")?;
        Ok(Duration::from_millis(ms))
    } else if let Some(secs) = s.strip_suffix('s') {
        let secs: u64 = secs.parse().map_err(|_| "Invalid seconds")?;
        Ok(Duration::from_secs(secs))
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins: u64 = mins.parse().map_err(|_| "Invalid minutes")?;
        Ok(Duration::from_secs(mins * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        let hours: u64 = hours.parse().map_err(|_| "Invalid hours")?;
        Ok(Duration::from_secs(hours * 3600))
    } else {
        // Try parsing as raw seconds
        let secs: u64 = s.parse().map_err(|_| "Invalid duration format")?;
        Ok(Duration::from_secs(secs))
    }
}
