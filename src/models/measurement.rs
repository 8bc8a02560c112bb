//! Endpoint, probe and measurement data models

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProbeError;

/// A remote probe server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Address handed to the probe tool
    pub address: String,
    /// Name used in metric paths and tags
    pub label: String,
}

impl Endpoint {
    /// Create an endpoint, falling back to the address when no label is given
    pub fn new<A: Into<String>>(address: A, label: Option<String>) -> Self {
        let address = address.into();
        let label = match label {
            Some(label) if !label.is_empty() => label,
            _ => address.clone(),
        };
        Self { address, label }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address == self.label {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} [{}]", self.address, self.label)
        }
    }
}

/// Direction of a throughput test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Remote to local
    Download,
    /// Local to remote
    Upload,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Download => "download",
            Direction::Upload => "upload",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output of one probe invocation
#[derive(Debug)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    pub direction: Direction,
    /// Combined stdout and stderr of the tool
    pub raw_text: String,
    pub execution_error: Option<ProbeError>,
}

impl ProbeResult {
    pub fn completed(endpoint: &Endpoint, direction: Direction, raw_text: String) -> Self {
        Self {
            endpoint: endpoint.clone(),
            direction,
            raw_text,
            execution_error: None,
        }
    }

    pub fn failed(endpoint: &Endpoint, direction: Direction, raw_text: String, error: ProbeError) -> Self {
        Self {
            endpoint: endpoint.clone(),
            direction,
            raw_text,
            execution_error: Some(error),
        }
    }
}

/// Throughput as reported by the tool, in kilobits per second
///
/// Tools that print a decimal value keep up to three fractional digits in
/// `thousandths` (same sign as the whole value), so that conversion to bits
/// per second stays exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedThroughput {
    pub kilobits_per_second: i64,
    pub thousandths: i16,
}

impl ParsedThroughput {
    pub fn from_kilobits(kilobits_per_second: i64) -> Self {
        Self { kilobits_per_second, thousandths: 0 }
    }
}

/// A normalized throughput fact, ready to be formatted for a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measurement {
    pub endpoint_address: String,
    pub endpoint_label: String,
    pub direction: Direction,
    pub bits_per_second: i64,
    pub observed_at_unix_seconds: i64,
}

impl Measurement {
    pub fn new(endpoint: &Endpoint, direction: Direction, bits_per_second: i64, observed_at_unix_seconds: i64) -> Self {
        Self {
            endpoint_address: endpoint.address.clone(),
            endpoint_label: endpoint.label.clone(),
            direction,
            bits_per_second,
            observed_at_unix_seconds,
        }
    }
}

/// A formatted record and the backend it is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkPayload {
    pub target: String,
    pub body: String,
}
