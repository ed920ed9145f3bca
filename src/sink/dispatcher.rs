//! Batch dispatcher: turns samples into points and writes them off the
//! worker's timing path.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::probe::{Batch, Sample};

use super::{MetricsSink, Point};

/// Source host tag value when the local hostname cannot be read.
const UNKNOWN_HOST: &str = "unknown";

/// Local hostname, used as the `src_host` tag.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

/// Hands completed batches to a [`MetricsSink`] on their own task.
///
/// Delivery is at-most-once: a failed write is logged and the batch is gone,
/// and a batch still in flight when the process exits is lost.
#[derive(Clone)]
pub struct BatchDispatcher {
    sink: Arc<dyn MetricsSink>,
    measurement: Arc<str>,
    source_host: Arc<str>,
}

impl BatchDispatcher {
    pub fn new(
        sink: Arc<dyn MetricsSink>,
        measurement: impl Into<Arc<str>>,
        source_host: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            sink,
            measurement: measurement.into(),
            source_host: source_host.into(),
        }
    }

    /// Convert one sample into a point stamped now.
    pub fn to_point(&self, sample: &Sample) -> Point {
        let mut point = Point::new(self.measurement.as_ref(), Utc::now())
            .with_tag("src_host", self.source_host.as_ref())
            .with_tag("target_host", sample.host.as_str())
            .with_tag("target_name", sample.target.as_str())
            .with_field("losspct", i64::from(sample.loss_pct));

        if let Some(latency) = sample.latency {
            point = point
                .with_field("min", latency.min)
                .with_field("avg", latency.avg)
                .with_field("max", latency.max);
        }
        if !sample.probe.is_empty() {
            point = point.with_tag("probe", sample.probe.as_str());
        }
        if !sample.probe_set.is_empty() {
            point = point.with_tag("probe_set", sample.probe_set.as_str());
        }
        point
    }

    /// Write a batch synchronously with respect to the caller.
    pub async fn deliver(&self, profile: &str, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        let points: Vec<Point> = batch.iter().map(|s| self.to_point(s)).collect();

        match self.sink.write(&points).await {
            Ok(()) => {
                tracing::debug!(
                    profile = %profile,
                    sink = self.sink.name(),
                    points = points.len(),
                    "Batch written"
                );
            }
            Err(e) => {
                tracing::error!(
                    profile = %profile,
                    sink = self.sink.name(),
                    points = points.len(),
                    error = %e,
                    "Batch write failed, dropping batch"
                );
            }
        }
    }

    /// Spawn the write and return immediately.
    ///
    /// Callers drop the handle; it is returned for tests.
    pub fn dispatch(&self, profile: impl Into<String>, batch: Batch) -> JoinHandle<()> {
        let dispatcher = self.clone();
        let profile = profile.into();
        tokio::spawn(async move { dispatcher.deliver(&profile, batch).await })
    }
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("sink", &self.sink.name())
            .field("measurement", &self.measurement)
            .field("source_host", &self.source_host)
            .finish()
    }
}
