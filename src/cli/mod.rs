//! Command-line interface

use crate::logging::LogFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Metrics backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TsdbType {
    /// Carbon plaintext protocol over TCP
    Graphite,
    /// Influx line protocol over HTTP
    Influx,
}

/// Cloud Bandwidth - measure endpoint bandwidth and record the results to a TSDB
///
/// Every option can also be set through the environment variable shown next
/// to it, or in a `.env` file in the working directory. Values that are not
/// given fall back to the YAML configuration file and then to built-in
/// defaults.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "cbandwidth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, value_name = "PATH", env = "CBANDWIDTH_CONFIG")]
    pub configuration: Option<PathBuf>,

    /// Container image providing the probe tool
    #[arg(long, env = "CBANDWIDTH_PERF_IMAGE")]
    pub image: Option<String>,

    /// Perf servers as a comma-separated list of `address` or `address:label`
    #[arg(long, value_name = "LIST", env = "CBANDWIDTH_PERF_SERVERS")]
    pub perf_servers: Option<String>,

    /// Metrics backend type
    #[arg(long, value_enum, env = "CBANDWIDTH_TSDB_TYPE")]
    pub tsdbtype: Option<TsdbType>,

    /// Address of the Graphite/Carbon server
    #[arg(long, env = "CBANDWIDTH_GRAFANA_ADDRESS")]
    pub grafana_address: Option<String>,

    /// Port of the Graphite/Carbon server
    #[arg(long, env = "CBANDWIDTH_GRAFANA_PORT")]
    pub grafana_port: Option<u16>,

    /// Influx write endpoint URL
    #[arg(long, value_name = "URL", env = "CBANDWIDTH_INFLUX_ADDRESS")]
    pub influx_url: Option<String>,

    /// Seconds between the end of one sweep and the start of the next
    #[arg(long, value_name = "SECONDS", env = "CBANDWIDTH_POLL_INTERVAL")]
    pub test_interval: Option<u64>,

    /// Length of each probe run in seconds
    #[arg(long, value_name = "SECONDS", env = "CBANDWIDTH_POLL_LENGTH")]
    pub test_length: Option<u64>,

    /// Parallel client streams per probe (iperf3 only)
    #[arg(long, env = "CBANDWIDTH_IPERF_PARALLEL")]
    pub parallel_connections: Option<u32>,

    /// Probe server port (iperf3 default 5201, netperf default 12865)
    #[arg(long, env = "CBANDWIDTH_PERF_SERVER_PORT")]
    pub perf_server_port: Option<u16>,

    /// Metric prefix for download results
    #[arg(long, env = "CBANDWIDTH_DOWNLOAD_PREFIX")]
    pub tsdb_download_prefix: Option<String>,

    /// Metric prefix for upload results (not used with netperf)
    #[arg(long, env = "CBANDWIDTH_UPLOAD_PREFIX")]
    pub tsdb_upload_prefix: Option<String>,

    /// Influx measurement name
    #[arg(long, env = "CBANDWIDTH_MEASUREMENT_NAME")]
    pub measurement_name: Option<String>,

    /// Account email sent with Influx writes
    #[arg(long, env = "CBANDWIDTH_KENTIK_EMAIL")]
    pub kentik_email: Option<String>,

    /// API token sent with Influx writes
    #[arg(long, env = "CBANDWIDTH_KENTIK_TOKEN", hide_env_values = true)]
    pub kentik_token: Option<String>,

    /// Use netperf instead of iperf3 (download only)
    #[arg(long, env = "CBANDWIDTH_NETPERF")]
    pub netperf: bool,

    /// Run the probe binary on the host instead of in a container
    #[arg(long, env = "CBANDWIDTH_NOCONTAINER")]
    pub nocontainer: bool,

    /// Log probe command lines and sink payloads
    #[arg(long, env = "CBANDWIDTH_DEBUG")]
    pub debug: bool,

    /// Number of endpoints measured at the same time
    #[arg(long, env = "CBANDWIDTH_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Hard deadline for a single probe run in seconds (default: test length + 30)
    #[arg(long, value_name = "SECONDS", env = "CBANDWIDTH_PROBE_TIMEOUT")]
    pub probe_timeout: Option<u64>,

    /// Log output format: console, json or compact
    #[arg(long, value_name = "FORMAT", env = "CBANDWIDTH_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Source name reported with Influx measurements
    #[arg(long, env = "CBANDWIDTH_HOSTNAME")]
    pub hostname: Option<String>,

    /// Run a single sweep and exit
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
