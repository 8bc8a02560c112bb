//! Probe launchers: host binary or container runtime wrapper

use crate::error::{AppError, Result};
use crate::models::{ProbeToolKind, ResolvedConfig};
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use uuid::Uuid;

/// Prefix of the name given to every probe container
pub const CONTAINER_NAME_PREFIX: &str = "cbandwidth-probe";

/// Container runtime able to run the probe image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Runtimes in order of preference
    pub const CANDIDATES: [ContainerRuntime; 2] = [ContainerRuntime::Docker, ContainerRuntime::Podman];

    pub fn binary(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }

    /// Check whether the runtime's CLI answers `--version`
    pub async fn is_available(&self) -> bool {
        Command::new(self.binary())
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Find the first available runtime
    pub async fn detect() -> Result<Self> {
        for runtime in Self::CANDIDATES {
            if runtime.is_available().await {
                return Ok(runtime);
            }
        }
        Err(AppError::runtime(
            "docker or podman is required for container mode, use the flag \"--nocontainer\" to run the probe binary from the host",
        ))
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// A named container started for one probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRun {
    pub runtime: ContainerRuntime,
    pub name: String,
}

impl ContainerRun {
    fn new(runtime: ContainerRuntime) -> Self {
        Self {
            runtime,
            name: format!("{}-{}", CONTAINER_NAME_PREFIX, Uuid::new_v4().simple()),
        }
    }

    /// `<runtime> rm -f <name>`, for a run whose client was killed
    pub fn removal_command(&self) -> (String, Vec<String>) {
        (
            self.runtime.binary().to_string(),
            vec!["rm".to_string(), "-f".to_string(), self.name.clone()],
        )
    }
}

/// Program, arguments and container (if any) of one probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub container: Option<ContainerRun>,
}

/// How a probe process is started, fixed once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeLauncher {
    /// Run the tool installed on the host
    Host { program: String },
    /// `<runtime> run -i --rm <image> <tool args>`
    Container { runtime: ContainerRuntime, image: String },
}

impl ProbeLauncher {
    pub fn host(tool: ProbeToolKind) -> Self {
        ProbeLauncher::Host { program: tool.binary_name().to_string() }
    }

    pub fn container<S: Into<String>>(runtime: ContainerRuntime, image: S) -> Self {
        ProbeLauncher::Container { runtime, image: image.into() }
    }

    /// Pick the launcher for this run, detecting a container runtime if needed
    pub async fn resolve(config: &ResolvedConfig) -> Result<Self> {
        if !config.launcher.use_container {
            return Ok(Self::host(config.probe_tool));
        }
        let runtime = ContainerRuntime::detect().await?;
        Ok(Self::container(runtime, config.launcher.image.clone()))
    }

    /// Full command for the given tool arguments; container runs get a
    /// unique name
    pub fn invocation(&self, tool_args: Vec<String>) -> Invocation {
        match self {
            ProbeLauncher::Host { program } => Invocation {
                program: program.clone(),
                args: tool_args,
                container: None,
            },
            ProbeLauncher::Container { runtime, image } => {
                let container = ContainerRun::new(*runtime);
                let mut args = vec![
                    "run".to_string(),
                    "-i".to_string(),
                    "--rm".to_string(),
                    "--name".to_string(),
                    container.name.clone(),
                    image.clone(),
                ];
                args.extend(tool_args);
                Invocation {
                    program: runtime.binary().to_string(),
                    args,
                    container: Some(container),
                }
            }
        }
    }
}

impl fmt::Display for ProbeLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeLauncher::Host { program } => write!(f, "{}", program),
            ProbeLauncher::Container { runtime, image } => write!(f, "{} run -i --rm {}", runtime, image),
        }
    }
}
