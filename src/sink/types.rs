//! Points and their InfluxDB line-protocol encoding.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// One time-series point.
///
/// Tags and fields are kept sorted so the encoded line is stable.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub ts: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            ts,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Encode as one line of InfluxDB line protocol (no trailing newline).
    ///
    /// Tags with empty values are left out, the protocol cannot carry them.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(128);
        escape_into(&mut line, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }

        let mut first = true;
        for (key, value) in &self.fields {
            line.push(if first { ' ' } else { ',' });
            first = false;
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            match value {
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{v}i");
                }
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
            }
        }

        let ts = self.ts.timestamp_nanos_opt().unwrap_or_default();
        let _ = write!(line, " {ts}");
        line
    }
}

/// Encode points as a newline-separated line-protocol body.
pub fn encode_lines(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
