//! Core sink trait.

use super::{Point, SinkError};

/// Destination for completed batches.
///
/// One call to [`MetricsSink::write`] per batch. Implementations must be
/// cheap to share: the dispatcher holds them behind an `Arc` and calls
/// `write` from many tasks at once.
#[async_trait::async_trait]
pub trait MetricsSink: Send + Sync + 'static {
    /// Short label for logs (e.g. "influxdb-udp").
    fn name(&self) -> &str;

    /// Write all points of one batch.
    async fn write(&self, points: &[Point]) -> Result<(), SinkError>;
}
