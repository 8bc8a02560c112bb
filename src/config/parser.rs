//! Configuration resolution from CLI arguments, environment and the YAML file

use crate::{
    cli::{Cli, TsdbType},
    config::file::{non_empty, ConfigFile, Scalar},
    defaults,
    error::{AppError, Result},
    logging::LogFormat,
    models::{Credentials, LauncherConfig, ProbeToolKind, ResolvedConfig, SinkConfig},
    registry::EndpointRegistry,
};
use std::path::PathBuf;
use std::str::FromStr;

/// Merges CLI arguments (which already carry `CBANDWIDTH_*` environment
/// values) with the configuration file and built-in defaults
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Path of the configuration file to read
    pub fn config_path(&self) -> PathBuf {
        self.cli
            .configuration
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::DEFAULT_CONFIG_PATH))
    }

    /// Read the configuration file; a missing file is not an error
    pub fn load_file(&self) -> Result<Option<ConfigFile>> {
        ConfigFile::load(&self.config_path())
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<ResolvedConfig> {
        let file = self.load_file()?;
        self.resolve(file.as_ref())
    }

    /// Resolve and validate the configuration against an already loaded file
    pub fn resolve(&self, file: Option<&ConfigFile>) -> Result<ResolvedConfig> {
        let empty = ConfigFile::default();
        let file = file.unwrap_or(&empty);
        let cli = &self.cli;

        let probe_tool = if cli.netperf { ProbeToolKind::Netperf } else { ProbeToolKind::Iperf3 };

        let test_length_seconds =
            pick(cli.test_length, &file.test_length, "test-length")?.unwrap_or(defaults::DEFAULT_TEST_LENGTH.as_secs());
        let sweep_interval_seconds = pick(cli.test_interval, &file.test_interval, "test-interval")?
            .unwrap_or(defaults::DEFAULT_SWEEP_INTERVAL.as_secs());

        let mut probe_port = pick(cli.perf_server_port, &file.server_port, "server-port")?.unwrap_or(probe_tool.default_port());
        let mut image = non_empty(&cli.image).unwrap_or_else(|| probe_tool.default_image().to_string());
        if probe_tool == ProbeToolKind::Netperf {
            // iperf3 defaults left in place make no sense for netperf
            if probe_port == defaults::DEFAULT_IPERF_PORT {
                probe_port = defaults::DEFAULT_NETPERF_PORT;
            }
            if image == defaults::DEFAULT_IPERF_IMAGE {
                image = defaults::DEFAULT_NETPERF_IMAGE.to_string();
            }
        }

        let sink = self.resolve_sink(file)?;

        let mut registry = file.endpoints()?;
        if let Some(list) = &cli.perf_servers {
            registry.extend(EndpointRegistry::parse_list(list)?);
        }

        let config = ResolvedConfig {
            test_length_seconds,
            sweep_interval_seconds,
            parallel_connections: cli.parallel_connections.unwrap_or(defaults::DEFAULT_PARALLEL_CONNECTIONS),
            probe_port,
            probe_tool,
            launcher: LauncherConfig {
                use_container: !cli.nocontainer,
                image,
            },
            probe_timeout_seconds: cli
                .probe_timeout
                .unwrap_or(test_length_seconds.saturating_add(defaults::PROBE_TIMEOUT_GRACE.as_secs())),
            max_concurrency: cli.max_concurrency.unwrap_or(defaults::DEFAULT_MAX_CONCURRENCY),
            sink,
            download_prefix: non_empty(&cli.tsdb_download_prefix)
                .or_else(|| non_empty(&file.tsdb_download_prefix))
                .unwrap_or_else(|| defaults::DEFAULT_DOWNLOAD_PREFIX.to_string()),
            upload_prefix: non_empty(&cli.tsdb_upload_prefix)
                .or_else(|| non_empty(&file.tsdb_upload_prefix))
                .unwrap_or_else(|| defaults::DEFAULT_UPLOAD_PREFIX.to_string()),
            measurement_name: non_empty(&cli.measurement_name)
                .or_else(|| non_empty(&file.measurement_name))
                .unwrap_or_else(|| defaults::DEFAULT_MEASUREMENT_NAME.to_string()),
            hostname: resolve_hostname(non_empty(&cli.hostname)),
            endpoints: registry.into_vec(),
            debug: cli.debug,
            log_format: cli.log_format.unwrap_or(LogFormat::Console),
            enable_color: cli.use_colors(),
            run_once: cli.once,
        };

        config.validate()?;
        Ok(config)
    }

    fn resolve_sink(&self, file: &ConfigFile) -> Result<SinkConfig> {
        let cli = &self.cli;
        match cli.tsdbtype.unwrap_or(TsdbType::Graphite) {
            TsdbType::Influx => {
                let url = non_empty(&cli.influx_url)
                    .or_else(|| non_empty(&file.influx_url))
                    .ok_or_else(|| {
                        AppError::config("tsdbtype is 'influx' but no Influx URL was given (--influx-url or influx-url)")
                    })?;
                Ok(SinkConfig::Influx {
                    url,
                    credentials: Credentials {
                        email: cli.kentik_email.clone().unwrap_or_default(),
                        api_token: cli.kentik_token.clone().unwrap_or_default(),
                    },
                })
            }
            TsdbType::Graphite => {
                let host = non_empty(&cli.grafana_address)
                    .or_else(|| non_empty(&file.grafana_address))
                    .ok_or_else(|| {
                        AppError::config(
                            "No Carbon server configured; pass --grafana-address or set grafana-address in the configuration file",
                        )
                    })?;
                let port = pick(cli.grafana_port, &file.grafana_port, "grafana-port")?
                    .unwrap_or(defaults::DEFAULT_CARBON_PORT);
                Ok(SinkConfig::Graphite {
                    address: join_host_port(&host, port),
                })
            }
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<ResolvedConfig> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &ResolvedConfig) -> String {
    let mut summary = Vec::new();

    let endpoints: Vec<String> = config.endpoints.iter().map(|e| e.to_string()).collect();
    summary.push(format!("Perf servers: {}", endpoints.join(", ")));
    summary.push(format!("Probe tool: {} (port {})", config.probe_tool, config.probe_port));
    if config.launcher.use_container {
        summary.push(format!("Container image: {}", config.launcher.image));
    } else {
        summary.push("Container: disabled".to_string());
    }
    summary.push(format!("Test length: {}s", config.test_length_seconds));
    summary.push(format!("Test interval: {}s", config.sweep_interval_seconds));
    summary.push(format!("Parallel connections: {}", config.parallel_connections));
    summary.push(format!("Max concurrency: {}", config.max_concurrency));
    summary.push(format!("Probe timeout: {}s", config.probe_timeout_seconds));
    summary.push(format!("Sink: {} {}", config.sink.kind(), config.sink.target()));
    if let SinkConfig::Influx { credentials, .. } = &config.sink {
        summary.push(format!("Credentials: {:?}", credentials));
    }
    summary.push(format!("Download prefix: {}", config.download_prefix));
    summary.push(format!("Upload prefix: {}", config.upload_prefix));
    summary.push(format!("Measurement name: {}", config.measurement_name));
    summary.push(format!("Hostname: {}", config.hostname));

    summary.join("\n")
}

/// CLI value if given, otherwise the file value
fn pick<T>(cli: Option<T>, file: &Option<Scalar>, key: &str) -> Result<Option<T>>
where
    T: FromStr + TryFrom<u64>,
{
    match (cli, file) {
        (Some(value), _) => Ok(Some(value)),
        (None, Some(scalar)) => scalar.value(key),
        (None, None) => Ok(None),
    }
}

/// `host:port`, bracketing IPv6 literals
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Name reported as the measurement source
pub fn resolve_hostname(explicit: Option<String>) -> String {
    if let Some(name) = explicit {
        return name;
    }

    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    system_hostname().unwrap_or_else(|| "unknown".to_string())
}

fn system_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().trim().to_string())
        .filter(|name| !name.is_empty())
}
