//! Probe execution
//!
//! A probe runs the external benchmark tool once against one endpoint in one
//! direction and hands back everything the tool printed. Interpreting that
//! text is the parser's job; enforcing a deadline and cancellation is the
//! scheduler's.

pub mod runtime;

pub use runtime::{ContainerRun, ContainerRuntime, Invocation, ProbeLauncher};

use crate::error::ProbeError;
use crate::logging::SweepLogger;
use crate::models::{Direction, Endpoint, ProbeResult, ProbeToolKind, ResolvedConfig};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Runs the benchmark tool for one endpoint and direction
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint, direction: Direction) -> ProbeResult;
}

/// Tool parameters shared by every invocation of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeParams {
    pub tool: ProbeToolKind,
    pub parallel_connections: u32,
    pub test_length_seconds: u64,
    pub port: u16,
}

impl From<&ResolvedConfig> for ProbeParams {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            tool: config.probe_tool,
            parallel_connections: config.parallel_connections,
            test_length_seconds: config.test_length_seconds,
            port: config.probe_port,
        }
    }
}

impl ProbeParams {
    /// Argument vector for the tool itself, without any launcher prefix
    pub fn tool_arguments(&self, endpoint: &Endpoint, direction: Direction) -> Vec<String> {
        match self.tool {
            ProbeToolKind::Iperf3 => {
                let mut args = vec!["-P".to_string(), self.parallel_connections.to_string()];
                if direction == Direction::Upload {
                    args.push("-R".to_string());
                }
                args.extend([
                    "-t".to_string(),
                    self.test_length_seconds.to_string(),
                    "-f".to_string(),
                    "k".to_string(),
                    "-p".to_string(),
                    self.port.to_string(),
                    "-c".to_string(),
                    endpoint.address.clone(),
                ]);
                args
            }
            ProbeToolKind::Netperf => vec![
                "-P".to_string(),
                "0".to_string(),
                "-t".to_string(),
                "TCP_STREAM".to_string(),
                "-f".to_string(),
                "k".to_string(),
                "-l".to_string(),
                self.test_length_seconds.to_string(),
                "-p".to_string(),
                self.port.to_string(),
                "-H".to_string(),
                endpoint.address.clone(),
            ],
        }
    }
}

/// Probe executor that spawns the tool as a child process
pub struct CommandProbe {
    launcher: ProbeLauncher,
    params: ProbeParams,
    logger: Option<SweepLogger>,
}

impl CommandProbe {
    pub fn new(launcher: ProbeLauncher, params: ProbeParams) -> Self {
        Self { launcher, params, logger: None }
    }

    /// Log every command line at debug level
    pub fn with_logger(mut self, logger: SweepLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Command for one probe run
    pub fn invocation(&self, endpoint: &Endpoint, direction: Direction) -> Invocation {
        self.launcher
            .invocation(self.params.tool_arguments(endpoint, direction))
    }
}

#[async_trait]
impl ProbeExecutor for CommandProbe {
    async fn probe(&self, endpoint: &Endpoint, direction: Direction) -> ProbeResult {
        let Invocation { program, args, container } = self.invocation(endpoint, direction);
        if let Some(logger) = &self.logger {
            logger.command(&program, &args).await;
        }

        // kill_on_drop only reaches the runtime client, not the container
        let mut cleanup = RemovalGuard::new(container.as_ref());
        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        cleanup.disarm();

        let output = match output {
            Ok(output) => output,
            Err(source) => {
                return ProbeResult::failed(endpoint, direction, String::new(), ProbeError::Spawn { program, source });
            }
        };

        let raw_text = combine_output(&output.stdout, &output.stderr);
        if !output.status.success() && self.params.tool.trusts_exit_status() {
            let status = output.status.to_string();
            return ProbeResult::failed(endpoint, direction, raw_text, ProbeError::ExitStatus { status });
        }

        ProbeResult::completed(endpoint, direction, raw_text)
    }
}

/// Runs a removal command if dropped while still armed, i.e. when the probe
/// future is abandoned on timeout or cancellation
struct RemovalGuard {
    command: Option<(String, Vec<String>)>,
}

impl RemovalGuard {
    fn new(container: Option<&ContainerRun>) -> Self {
        Self { command: container.map(ContainerRun::removal_command) }
    }

    fn disarm(&mut self) {
        self.command = None;
    }
}

impl Drop for RemovalGuard {
    fn drop(&mut self) {
        let Some((program, args)) = self.command.take() else {
            return;
        };
        // Plain std process: it must outlive a runtime that is shutting down
        let spawned = std::process::Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Ok(mut child) = spawned {
            std::thread::spawn(move || child.wait());
        }
    }
}

/// Join stdout and stderr into one blob; some tools report errors on either
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(stderr));
    }
    text.trim().to_string()
}
