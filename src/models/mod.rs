//! Data models for configuration and measurements

pub mod config;
pub mod measurement;

pub use config::{Credentials, LauncherConfig, ProbeToolKind, ResolvedConfig, SinkConfig};
pub use measurement::{Direction, Endpoint, Measurement, ParsedThroughput, ProbeResult, SinkPayload};
