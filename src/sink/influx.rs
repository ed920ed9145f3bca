//! InfluxDB sinks over UDP and HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::net::UdpSocket;

use crate::config::{InfluxConfig, SinkTransport};

use super::{MetricsSink, Point, SinkError, encode_lines};

/// Largest UDP payload we send in one datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Line-protocol writer for InfluxDB's UDP listener.
///
/// The UDP listener is bound to a single database server-side, so `db` and
/// credentials are not sent.
#[derive(Debug)]
pub struct InfluxUdpSink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl InfluxUdpSink {
    /// Resolve `addr` and open a connected socket to it.
    pub async fn connect(addr: &str) -> Result<Self, SinkError> {
        let peer = tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
            SinkError::Config(format!("no address found for '{addr}'"))
        })?;

        let bind: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(peer).await?;

        tracing::debug!(peer = %peer, "InfluxDB UDP sink connected");
        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait::async_trait]
impl MetricsSink for InfluxUdpSink {
    fn name(&self) -> &str {
        "influxdb-udp"
    }

    async fn write(&self, points: &[Point]) -> Result<(), SinkError> {
        for datagram in pack_datagrams(points, MAX_DATAGRAM_SIZE) {
            self.socket.send(datagram.as_bytes()).await?;
        }
        Ok(())
    }
}

/// Group encoded lines into datagrams no larger than `limit` bytes.
///
/// A single line longer than `limit` still goes out on its own.
fn pack_datagrams(points: &[Point], limit: usize) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut current = String::new();

    for line in points.iter().map(Point::to_line) {
        if !current.is_empty() && current.len() + 1 + line.len() > limit {
            datagrams.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        datagrams.push(current);
    }
    datagrams
}

/// Line-protocol writer for the InfluxDB 1.x HTTP API (`POST /write`).
#[derive(Debug, Clone)]
pub struct InfluxHttpSink {
    client: Client,
    write_url: String,
    db: String,
    user: String,
    pass: String,
}

impl InfluxHttpSink {
    /// Create a sink for `base_url` (e.g. `http://127.0.0.1:8086`).
    pub fn new(
        base_url: &str,
        db: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            write_url: format!("{}/write", base_url.trim_end_matches('/')),
            db: db.into(),
            user: user.into(),
            pass: pass.into(),
        })
    }
}

#[async_trait::async_trait]
impl MetricsSink for InfluxHttpSink {
    fn name(&self) -> &str {
        "influxdb-http"
    }

    async fn write(&self, points: &[Point]) -> Result<(), SinkError> {
        let mut request = self
            .client
            .post(&self.write_url)
            .query(&[("db", self.db.as_str()), ("precision", "ns")])
            .body(encode_lines(points));

        if !self.user.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.pass));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Build the sink selected by `influxdb.transport`.
pub async fn connect_sink(config: &InfluxConfig) -> Result<Arc<dyn MetricsSink>, SinkError> {
    match config.transport {
        SinkTransport::Udp => Ok(Arc::new(InfluxUdpSink::connect(&config.address()).await?)),
        SinkTransport::Http => {
            let timeout = config.timeout().map_err(|e| SinkError::Config(e.to_string()))?;
            Ok(Arc::new(InfluxHttpSink::new(
                &config.http_url(),
                &config.db,
                &config.user,
                &config.pass,
                timeout,
            )?))
        }
    }
}
