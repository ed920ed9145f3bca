//! Sink Layer
//!
//! Delivery of completed batches to the time-series store:
//!
//! - [`MetricsSink`]: One `write` call per batch
//! - [`Point`]: Measurement, tags, fields and timestamp, encoded as InfluxDB line protocol
//! - [`InfluxUdpSink`] / [`InfluxHttpSink`]: InfluxDB transports
//! - [`BatchDispatcher`]: Sample → point conversion on a fire-and-forget task

mod dispatcher;
mod error;
mod influx;
mod traits;
mod types;

pub use dispatcher::{BatchDispatcher, local_hostname};
pub use error::SinkError;
pub use influx::{InfluxHttpSink, InfluxUdpSink, MAX_DATAGRAM_SIZE, connect_sink};
pub use traits::MetricsSink;
pub use types::{FieldValue, Point, encode_lines};
