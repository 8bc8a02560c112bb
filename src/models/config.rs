//! Resolved run configuration and validation

use crate::defaults;
use crate::error::{AppError, Result};
use crate::logging::LogFormat;
use crate::models::measurement::{Direction, Endpoint};
use std::fmt;
use std::time::Duration;

/// External benchmark tool used to measure throughput
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeToolKind {
    /// iperf3 client, measures both directions
    Iperf3,
    /// netperf TCP_STREAM, download only
    Netperf,
}

impl ProbeToolKind {
    /// Executable name when running from the host
    pub fn binary_name(&self) -> &'static str {
        match self {
            ProbeToolKind::Iperf3 => "iperf3",
            ProbeToolKind::Netperf => "netperf",
        }
    }

    pub fn default_image(&self) -> &'static str {
        match self {
            ProbeToolKind::Iperf3 => defaults::DEFAULT_IPERF_IMAGE,
            ProbeToolKind::Netperf => defaults::DEFAULT_NETPERF_IMAGE,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ProbeToolKind::Iperf3 => defaults::DEFAULT_IPERF_PORT,
            ProbeToolKind::Netperf => defaults::DEFAULT_NETPERF_PORT,
        }
    }

    /// Directions measured for every endpoint, in sweep order
    pub fn directions(&self) -> &'static [Direction] {
        match self {
            ProbeToolKind::Iperf3 => &[Direction::Download, Direction::Upload],
            ProbeToolKind::Netperf => &[Direction::Download],
        }
    }

    /// Whether a nonzero exit status means the measurement failed.
    ///
    /// netperf exits unsuccessfully in situations where its report is still
    /// usable, so only its output is inspected.
    pub fn trusts_exit_status(&self) -> bool {
        matches!(self, ProbeToolKind::Iperf3)
    }
}

impl fmt::Display for ProbeToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// How the probe tool is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Run the tool inside a docker/podman container
    pub use_container: bool,
    /// Image used in container mode
    pub image: String,
}

/// Account credentials sent with every HTTP sink request
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub email: String,
    pub api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("api_token", &redact(&self.api_token))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// The single metrics backend of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    /// Carbon plaintext protocol over TCP, `host:port`
    Graphite { address: String },
    /// Influx line protocol over HTTP POST
    Influx { url: String, credentials: Credentials },
}

impl SinkConfig {
    pub fn target(&self) -> &str {
        match self {
            SinkConfig::Graphite { address } => address,
            SinkConfig::Influx { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SinkConfig::Graphite { .. } => "graphite",
            SinkConfig::Influx { .. } => "influx",
        }
    }
}

/// Fully resolved configuration, immutable for the lifetime of a run
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Length of each probe run in seconds
    pub test_length_seconds: u64,
    /// Pause between two sweeps in seconds
    pub sweep_interval_seconds: u64,
    /// Parallel client streams (iperf3 only)
    pub parallel_connections: u32,
    pub probe_port: u16,
    pub probe_tool: ProbeToolKind,
    pub launcher: LauncherConfig,
    /// Hard deadline for a single probe invocation
    pub probe_timeout_seconds: u64,
    /// Number of endpoints measured at the same time
    pub max_concurrency: usize,
    pub sink: SinkConfig,
    pub download_prefix: String,
    pub upload_prefix: String,
    pub measurement_name: String,
    /// Reported as the measurement source
    pub hostname: String,
    pub endpoints: Vec<Endpoint>,
    pub debug: bool,
    pub log_format: LogFormat,
    pub enable_color: bool,
    /// Stop after a single sweep
    pub run_once: bool,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let probe_tool = ProbeToolKind::Iperf3;
        Self {
            test_length_seconds: defaults::DEFAULT_TEST_LENGTH.as_secs(),
            sweep_interval_seconds: defaults::DEFAULT_SWEEP_INTERVAL.as_secs(),
            parallel_connections: defaults::DEFAULT_PARALLEL_CONNECTIONS,
            probe_port: probe_tool.default_port(),
            probe_tool,
            launcher: LauncherConfig {
                use_container: true,
                image: probe_tool.default_image().to_string(),
            },
            probe_timeout_seconds: defaults::DEFAULT_TEST_LENGTH.as_secs()
                + defaults::PROBE_TIMEOUT_GRACE.as_secs(),
            max_concurrency: defaults::DEFAULT_MAX_CONCURRENCY,
            sink: SinkConfig::Graphite {
                address: format!("127.0.0.1:{}", defaults::DEFAULT_CARBON_PORT),
            },
            download_prefix: defaults::DEFAULT_DOWNLOAD_PREFIX.to_string(),
            upload_prefix: defaults::DEFAULT_UPLOAD_PREFIX.to_string(),
            measurement_name: defaults::DEFAULT_MEASUREMENT_NAME.to_string(),
            hostname: "localhost".to_string(),
            endpoints: Vec::new(),
            debug: false,
            log_format: LogFormat::Console,
            enable_color: true,
            run_once: false,
        }
    }
}

impl ResolvedConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Metric prefix for a direction
    pub fn prefix_for(&self, direction: Direction) -> &str {
        match direction {
            Direction::Download => &self.download_prefix,
            Direction::Upload => &self.upload_prefix,
        }
    }

    /// Validate the configuration and return the first defect found
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(AppError::config(
                "No perf servers configured; pass --perf-servers or list iperf-servers in the configuration file",
            ));
        }

        for endpoint in &self.endpoints {
            if endpoint.address.is_empty() {
                return Err(AppError::config("Perf server address cannot be empty"));
            }
            if endpoint.label.chars().any(char::is_whitespace) {
                return Err(AppError::config(format!(
                    "Perf server label '{}' cannot contain whitespace",
                    endpoint.label
                )));
            }
        }

        if self.test_length_seconds == 0 || self.test_length_seconds > 3600 {
            return Err(AppError::validation("Test length must be between 1 and 3600 seconds"));
        }

        if self.sweep_interval_seconds == 0 {
            return Err(AppError::validation("Test interval must be greater than 0"));
        }

        if self.parallel_connections == 0 || self.parallel_connections > 128 {
            return Err(AppError::validation("Parallel connections must be between 1 and 128"));
        }

        if self.probe_port == 0 {
            return Err(AppError::validation("Perf server port cannot be 0"));
        }

        if self.max_concurrency == 0 {
            return Err(AppError::validation("Max concurrency must be greater than 0"));
        }

        if self.probe_timeout_seconds <= self.test_length_seconds {
            return Err(AppError::validation(format!(
                "Probe timeout ({}s) must be longer than the test length ({}s)",
                self.probe_timeout_seconds, self.test_length_seconds
            )));
        }

        if self.launcher.use_container && self.launcher.image.trim().is_empty() {
            return Err(AppError::config("Container image cannot be empty"));
        }

        for (name, value) in [
            ("download prefix", &self.download_prefix),
            ("upload prefix", &self.upload_prefix),
            ("measurement name", &self.measurement_name),
        ] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(AppError::config(format!(
                    "The {} must be non-empty and contain no whitespace: '{}'",
                    name, value
                )));
            }
        }

        match &self.sink {
            SinkConfig::Graphite { address } => {
                if address.trim().is_empty() || address.starts_with(':') {
                    return Err(AppError::config("Graphite server address cannot be empty"));
                }
            }
            SinkConfig::Influx { url, .. } => {
                let parsed = url::Url::parse(url)
                    .map_err(|e| AppError::config(format!("Invalid Influx URL '{}': {}", url, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("Influx URL must use http or https: {}", url)));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ResolvedConfig {
        ResolvedConfig {
            endpoints: vec![Endpoint::new("10.0.0.5", None)],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_no_endpoints_invalid() {
        let config = ResolvedConfig::default();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_interval_invalid() {
        let mut config = valid_config();
        config.sweep_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_probe_timeout_must_exceed_test_length() {
        let mut config = valid_config();
        config.test_length_seconds = 10;
        config.probe_timeout_seconds = 10;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_influx_url_scheme() {
        let mut config = valid_config();
        config.sink = SinkConfig::Influx {
            url: "ftp://example.com/write".to_string(),
            credentials: Credentials::default(),
        };
        assert!(config.validate().is_err());

        config.sink = SinkConfig::Influx {
            url: "https://grpc.api.kentik.com/kmetrics/v202207/metrics/api/v2/write?bucket=&org=&precision=ns".to_string(),
            credentials: Credentials::default(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefix_whitespace_invalid() {
        let mut config = valid_config();
        config.download_prefix = "bandwidth download".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prefix_for_direction() {
        let config = valid_config();
        assert_eq!(config.prefix_for(Direction::Download), "bandwidth.download");
        assert_eq!(config.prefix_for(Direction::Upload), "bandwidth.upload");
    }

    #[test]
    fn test_tool_directions() {
        assert_eq!(ProbeToolKind::Iperf3.directions(), &[Direction::Download, Direction::Upload]);
        assert_eq!(ProbeToolKind::Netperf.directions(), &[Direction::Download]);
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let credentials = Credentials {
            email: "ops@example.com".to_string(),
            api_token: "secret".to_string(),
        };
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("ops@example.com"));
        assert!(!rendered.contains("secret"));
    }
}
