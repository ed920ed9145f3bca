//! Application configuration structures.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::registry::Registry;

use super::probes::{TargetConfig, build_registry};
use super::validation::{ConfigError, expand_env_vars, parse_duration};

// =============================================================================
// Constants
// =============================================================================

/// Default fping period between probes to one target, in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Default number of probes per target per cycle.
pub const DEFAULT_CYCLE: u32 = 10;

/// Default capacity of the debug event channel.
pub const DEFAULT_DEBUG_CHANNEL_CAPACITY: usize = 1024;

/// Default sink request timeout.
pub const DEFAULT_SINK_TIMEOUT: &str = "5s";

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_cycle() -> u32 {
    DEFAULT_CYCLE
}

fn default_debug_channel_capacity() -> usize {
    DEFAULT_DEBUG_CHANNEL_CAPACITY
}

fn default_sink_timeout() -> String {
    DEFAULT_SINK_TIMEOUT.to_string()
}

// =============================================================================
// fping Configuration
// =============================================================================

/// Tuning knobs passed to every fping invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FpingConfig {
    /// Binary name or path (default: "fping").
    pub binary: String,

    /// Exponential backoff factor for retries, `-B` (default: 1).
    pub backoff_factor: u32,

    /// Retries per probe, `-r` (default: 1).
    pub retries: u32,

    /// Milliseconds between packets to different targets, `-i` (default: 10).
    pub burst_interval: u32,
}

impl Default for FpingConfig {
    fn default() -> Self {
        Self {
            binary: "fping".to_string(),
            backoff_factor: 1,
            retries: 1,
            burst_interval: 10,
        }
    }
}

// =============================================================================
// InfluxDB Configuration
// =============================================================================

/// How batches reach InfluxDB.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SinkTransport {
    /// Line protocol datagrams to the UDP listener.
    #[default]
    Udp,
    /// `POST /write` against the HTTP API.
    Http,
}

/// InfluxDB sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Transport (default: udp).
    #[serde(default)]
    pub transport: SinkTransport,

    /// Server host.
    pub host: String,

    /// Server port (UDP listener or HTTP API).
    pub port: u16,

    /// Database name.
    pub db: String,

    /// Measurement every point is written to.
    pub measurement: String,

    /// HTTP user, `${VAR}` expanded.
    #[serde(default)]
    pub user: String,

    /// HTTP password, `${VAR}` expanded.
    #[serde(default)]
    pub pass: String,

    /// HTTP request timeout (default: "5s").
    #[serde(default = "default_sink_timeout")]
    pub timeout: String,
}

impl InfluxConfig {
    /// `host:port` of the server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL of the HTTP API.
    pub fn http_url(&self) -> String {
        format!("http://{}", self.address())
    }

    /// Parsed request timeout.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.timeout)
            .map_err(|e| ConfigError::invalid(format!("influxdb timeout: {e}")))
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
///
/// Loaded once at startup and handed to the orchestrator behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Echo parsed results and raw fping output (default: false).
    #[serde(default)]
    pub debug: bool,

    /// fping `-p` period in milliseconds, also the pause between cycles.
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// fping `-C` count per cycle.
    #[serde(default = "default_cycle")]
    pub cycle: u32,

    /// Capacity of the debug event channel.
    #[serde(default = "default_debug_channel_capacity")]
    pub debug_channel_capacity: usize,

    #[serde(default)]
    pub fping: FpingConfig,

    pub influxdb: InfluxConfig,

    /// Probe sets: set name → probe name → ToS value.
    pub probes: BTreeMap<String, BTreeMap<String, u8>>,

    /// Targets by id.
    pub targets: BTreeMap<String, TargetConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.influxdb.user = expand_env_vars(&config.influxdb.user);
        config.influxdb.pass = expand_env_vars(&config.influxdb.pass);
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::invalid("interval must be positive"));
        }
        if self.cycle == 0 {
            return Err(ConfigError::invalid("cycle must be positive"));
        }
        if self.debug_channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "debug_channel_capacity must be positive",
            ));
        }
        if self.fping.binary.trim().is_empty() {
            return Err(ConfigError::invalid("fping binary cannot be empty"));
        }

        let influx = &self.influxdb;
        for (key, value) in [
            ("host", &influx.host),
            ("db", &influx.db),
            ("measurement", &influx.measurement),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "please set `influxdb.{key}`"
                )));
            }
        }
        if influx.port == 0 {
            return Err(ConfigError::invalid("influxdb port must be non-zero"));
        }
        influx.timeout()?;

        if self.probes.is_empty() {
            return Err(ConfigError::invalid("please configure probes"));
        }
        if self.targets.is_empty() {
            return Err(ConfigError::invalid("please define targets"));
        }

        // Target-level checks live with the registry construction.
        self.registry().map(|_| ())
    }

    /// Build the immutable target/profile registry.
    pub fn registry(&self) -> Result<Registry, ConfigError> {
        build_registry(&self.probes, &self.targets)
    }

    /// fping period as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }
}
