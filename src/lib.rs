//! Cloud Bandwidth
//!
//! Periodically measures throughput to a set of remote iperf3 or netperf
//! servers and forwards the results to a Graphite (Carbon plaintext) or
//! Influx line-protocol backend.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod parser;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod sink;

// Re-export commonly used types
pub use error::{AppError, ParseError, ProbeError, Result, SinkError};
pub use models::{Direction, Endpoint, Measurement, ProbeToolKind, ResolvedConfig, SinkConfig};
pub use registry::EndpointRegistry;
pub use scheduler::{Scheduler, SweepReport};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_CONFIG_PATH: &str = "configuration.yaml";
    pub const DEFAULT_TEST_LENGTH: Duration = Duration::from_secs(5);
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
    pub const DEFAULT_PARALLEL_CONNECTIONS: u32 = 1;
    pub const DEFAULT_MAX_CONCURRENCY: usize = 1;
    /// Added to the test length to form the per-probe deadline
    pub const PROBE_TIMEOUT_GRACE: Duration = Duration::from_secs(30);
    pub const SINK_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const SINK_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub const DEFAULT_IPERF_IMAGE: &str = "quay.io/networkstatic/iperf3";
    pub const DEFAULT_NETPERF_IMAGE: &str = "quay.io/networkstatic/netperf";
    pub const DEFAULT_IPERF_PORT: u16 = 5201;
    pub const DEFAULT_NETPERF_PORT: u16 = 12865;
    pub const DEFAULT_CARBON_PORT: u16 = 2003;

    pub const DEFAULT_DOWNLOAD_PREFIX: &str = "bandwidth.download";
    pub const DEFAULT_UPLOAD_PREFIX: &str = "bandwidth.upload";
    pub const DEFAULT_MEASUREMENT_NAME: &str = "bandwidth";
}
