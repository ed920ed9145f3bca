//! fping `-C` summary line parser.
//!
//! fping prints one summary line per target on stderr once a counted run
//! finishes:
//!
//! ```text
//! blah.test address not found
//! 10.1.1.1   : 0.24 0.28
//! 8.8.8.8    : 30.31 -
//! ```
//!
//! Only the `<host> : <values>` shape yields a [`Sample`]. Everything else is
//! reported as a [`FormatError`] so callers can log it with their own context.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Token fping prints for a probe that got no reply.
pub const LOSS_SENTINEL: &str = "-";

/// Separator between host and values in a summary line.
const SEPARATOR: &str = ":";

/// A line that is not a well-formed summary line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Blank or single-field line.
    #[error("line has no values: '{0}'")]
    Truncated(String),

    /// Second field is not `:` (e.g. `host address not found`).
    #[error("unrecognized line: '{0}'")]
    MissingSeparator(String),

    /// A value is neither a non-negative latency nor the loss sentinel.
    #[error("invalid value '{token}' for host {host}")]
    InvalidToken { host: String, token: String },
}

/// Round-trip latency summary in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latency {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// One host's result for one polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Address as printed by fping.
    pub host: String,
    pub sent: u32,
    pub received: u32,
    /// Packet loss, 0..=100.
    pub loss_pct: u8,
    /// Present iff `received > 0`.
    pub latency: Option<Latency>,
    pub collected_at: DateTime<Utc>,
    /// Probe (profile) name, filled in by the worker.
    pub probe: String,
    /// Probe set name, filled in by the worker.
    pub probe_set: String,
    /// Target id, empty when the host is not in the worker's target map.
    pub target: String,
}

impl Sample {
    /// Whether at least one reply came back.
    pub fn is_up(&self) -> bool {
        self.latency.is_some()
    }
}

/// Parse one line of fping diagnostic output.
pub fn parse_line(line: &str) -> Result<Sample, FormatError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.len() < 2 {
        return Err(FormatError::Truncated(line.trim().to_string()));
    }
    if fields[1] != SEPARATOR {
        return Err(FormatError::MissingSeparator(line.trim().to_string()));
    }

    let host = fields[0];
    let mut sent: u32 = 0;
    let mut received: u32 = 0;
    let mut total = 0.0_f64;
    let mut min: Option<f64> = None;
    // Starts at zero and only moves on strictly greater values.
    let mut max = 0.0_f64;

    for token in &fields[2..] {
        if *token == LOSS_SENTINEL {
            sent += 1;
            continue;
        }

        let value = parse_latency(token).ok_or_else(|| FormatError::InvalidToken {
            host: host.to_string(),
            token: (*token).to_string(),
        })?;

        sent += 1;
        received += 1;
        total += value;
        if min.is_none_or(|m| value < m) {
            min = Some(value);
        }
        if value > max {
            max = value;
        }
    }

    let (loss_pct, latency) = match (sent, min) {
        (0, _) => (0, None),
        (_, Some(min)) if received > 0 => {
            let loss = (sent - received) * 100 / sent;
            let avg = total / f64::from(received);
            (loss as u8, Some(Latency { min, avg, max }))
        }
        _ => (100, None),
    };

    Ok(Sample {
        host: host.to_string(),
        sent,
        received,
        loss_pct,
        latency,
        collected_at: Utc::now(),
        probe: String::new(),
        probe_set: String::new(),
        target: String::new(),
    })
}

fn parse_latency(token: &str) -> Option<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
