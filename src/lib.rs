//! Joki - fping-driven latency collector
//!
//! This crate runs one `fping -C` loop per ToS probe profile, turns the
//! per-target summary lines into loss and latency samples, and ships every
//! cycle's batch to InfluxDB in line protocol. It can be used as a library
//! or run as a standalone binary with the `joki` executable.
//!
//! # Architecture
//!
//! - **Config**: YAML file with fping tuning, the InfluxDB sink, probe sets and targets
//! - **Registry**: flattened probe profiles and the targets linked to them
//! - **Probe**: fping launching, summary-line parsing, per-profile workers with backoff
//! - **Sink**: line-protocol encoding, UDP/HTTP writers, detached batch dispatch
//! - **Debug**: bounded event channel with a single consumer when debug is on
//! - **Orchestrator**: staggered worker startup and shutdown
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use joki::{AppConfig, BatchDispatcher, FpingLauncher, Orchestrator, connect_sink, local_hostname};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(AppConfig::load("configs/config.yaml")?);
//!     let registry = Arc::new(config.registry()?);
//!     let sink = connect_sink(&config.influxdb).await?;
//!     let dispatcher = BatchDispatcher::new(sink, config.influxdb.measurement.as_str(), local_hostname());
//!
//!     let running = Orchestrator::new(
//!         config.clone(),
//!         registry,
//!         Arc::new(FpingLauncher::new(&config.fping.binary)),
//!         dispatcher,
//!     )
//!     .start();
//!
//!     tokio::signal::ctrl_c().await?;
//!     running.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod debug;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod sink;

pub use config::{AppConfig, ConfigError, FpingConfig, InfluxConfig, SinkTransport};
pub use debug::{DebugEvent, DebugReceiver, DebugSender};
pub use orchestrator::{Orchestrator, RunningWorkers, startup_jitter};
pub use probe::{
    Backoff, Batch, FormatError, FpingLauncher, Latency, ProbeError, ProbeLauncher, ProbeWorker,
    Sample, parse_line,
};
pub use registry::{Profile, Registry, Target};
pub use sink::{
    BatchDispatcher, MetricsSink, Point, SinkError, connect_sink, local_hostname,
};
