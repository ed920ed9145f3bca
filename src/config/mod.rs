//! Configuration module for joki.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Probe timing (interval, cycle) and fping tuning
//! - InfluxDB sink settings
//! - Probe sets and targets, resolved into an immutable [`crate::Registry`]

mod app;
mod probes;
mod validation;

pub use app::{AppConfig, FpingConfig, InfluxConfig, SinkTransport};
pub use probes::{LINK_ALL, TargetConfig, build_registry};
pub use validation::{ConfigError, expand_env_vars, locate_binary, parse_duration};

// Re-export constants
pub use app::{DEFAULT_CYCLE, DEFAULT_DEBUG_CHANNEL_CAPACITY, DEFAULT_INTERVAL_MS};
