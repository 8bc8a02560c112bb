//! `.env` file handling

use crate::error::{AppError, Result};
use std::path::Path;

/// Prefix shared by every environment variable the collector reads
pub const ENV_PREFIX: &str = "CBANDWIDTH_";

/// Environment variables read by the command line parser
pub const SUPPORTED_ENV_VARS: &[&str] = &[
    "CBANDWIDTH_CONFIG",
    "CBANDWIDTH_PERF_IMAGE",
    "CBANDWIDTH_PERF_SERVERS",
    "CBANDWIDTH_TSDB_TYPE",
    "CBANDWIDTH_GRAFANA_ADDRESS",
    "CBANDWIDTH_GRAFANA_PORT",
    "CBANDWIDTH_INFLUX_ADDRESS",
    "CBANDWIDTH_POLL_INTERVAL",
    "CBANDWIDTH_POLL_LENGTH",
    "CBANDWIDTH_IPERF_PARALLEL",
    "CBANDWIDTH_PERF_SERVER_PORT",
    "CBANDWIDTH_DOWNLOAD_PREFIX",
    "CBANDWIDTH_UPLOAD_PREFIX",
    "CBANDWIDTH_MEASUREMENT_NAME",
    "CBANDWIDTH_KENTIK_EMAIL",
    "CBANDWIDTH_KENTIK_TOKEN",
    "CBANDWIDTH_NETPERF",
    "CBANDWIDTH_NOCONTAINER",
    "CBANDWIDTH_DEBUG",
    "CBANDWIDTH_MAX_CONCURRENCY",
    "CBANDWIDTH_PROBE_TIMEOUT",
    "CBANDWIDTH_LOG_FORMAT",
    "CBANDWIDTH_HOSTNAME",
];

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load a `.env` file into the process environment if it exists.
    ///
    /// Variables already set in the environment are left alone. Must run
    /// before the command line is parsed for the values to be picked up.
    pub fn load_env_file(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;
        Ok(true)
    }

    /// Names of `CBANDWIDTH_*` keys in a `.env` file that no option reads
    pub fn unknown_keys(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("Failed to read {}: {}", path.display(), e)))?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, _)| key.trim().trim_start_matches("export ").trim())
            .filter(|key| key.starts_with(ENV_PREFIX) && !SUPPORTED_ENV_VARS.contains(key))
            .map(str::to_string)
            .collect())
    }
}
