//! Cloud Bandwidth - Main CLI Application
//!
//! Measures throughput to the configured perf servers every test interval and
//! records the results to Graphite or Influx until interrupted.

use clap::Parser;
use cloud_bandwidth::{
    cli::Cli,
    config::{display_config_summary, ConfigParser, EnvManager},
    error::{AppError, Result},
    logging::{Logger, SweepLogger},
    probe::{CommandProbe, ProbeLauncher, ProbeParams},
    scheduler::Scheduler,
    sink::build_sink,
    PKG_NAME, VERSION,
};
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const BUILD_TIME: &str = env!("BUILD_TIME");
const GIT_COMMIT: &str = env!("GIT_COMMIT");
const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    // Must happen before parsing so clap sees the .env values
    let env_file = Path::new(".env");
    let env_loaded = match EnvManager::load_env_file(env_file) {
        Ok(loaded) => loaded,
        Err(e) => exit_with(&e, true),
    };

    let cli = Cli::parse();
    let use_color = cli.use_colors();

    if let Err(e) = run_application(cli, env_loaded).await {
        exit_with(&e, use_color);
    }
}

fn exit_with(error: &AppError, use_color: bool) -> ! {
    eprintln!("{}", error.format_for_console(use_color));
    print_error_suggestions(error);
    process::exit(error.exit_code());
}

/// Main application logic
async fn run_application(cli: Cli, env_loaded: bool) -> Result<()> {
    let parser = ConfigParser::new(cli);
    let config_path = parser.config_path();
    let file = parser.load_file()?;
    let config = Arc::new(parser.resolve(file.as_ref())?);

    let logger = Logger::with_config("CBANDWIDTH", &config);
    logger.set_session_id(Uuid::new_v4().to_string()).await;
    logger.add_context_field("hostname", &config.hostname).await;

    logger
        .info(&format!("{} v{} starting", PKG_NAME, VERSION))
        .field("commit", GIT_COMMIT)
        .log()
        .await;
    logger
        .debug("Build information")
        .field("build_time", BUILD_TIME)
        .field("target", TARGET_TRIPLE)
        .log()
        .await;

    if env_loaded {
        logger.debug("Loaded environment from .env").log().await;
        for key in EnvManager::unknown_keys(Path::new(".env"))? {
            logger
                .warn(&format!("Ignoring unknown variable {} in .env", key))
                .log()
                .await;
        }
    }

    if file.is_none() {
        logger
            .info(&format!(
                "No configuration file found at {}, using command line arguments",
                config_path.display()
            ))
            .log()
            .await;
    }

    for line in display_config_summary(&config).lines() {
        logger.debug(line).log().await;
    }

    let launcher = ProbeLauncher::resolve(&config).await?;
    logger
        .info(&format!("Running {} via {}", config.probe_tool, launcher))
        .field("endpoints", config.endpoints.len())
        .field("sink", config.sink.target())
        .log()
        .await;

    let sweep_logger = SweepLogger::new(&logger, &config);
    let probe = Arc::new(
        CommandProbe::new(launcher, ProbeParams::from(config.as_ref())).with_logger(sweep_logger.clone()),
    );
    let sink = build_sink(&config, &logger)?;
    let scheduler = Scheduler::new(config.clone(), probe, sink, sweep_logger);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let logger = logger.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            logger.warn("Shutdown signal received, stopping").log().await;
            cancel.cancel();
        });
    }

    let sweeps = scheduler.run(cancel).await;
    logger
        .info(&format!("Stopped after {} completed sweep(s)", sweeps))
        .log()
        .await;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Pass perf servers with --perf-servers=host1,host2:label or list iperf-servers in the YAML file");
            eprintln!("  - Graphite needs --grafana-address (port defaults to 2003)");
            eprintln!("  - Influx needs --tsdbtype=influx and --influx-url");
            eprintln!("  - Check the YAML file and .env for typos");
        }
        AppError::Validation(_) => {
            eprintln!();
            eprintln!("Validation help:");
            eprintln!("  - Test length must be 1-3600 seconds and shorter than the probe timeout");
            eprintln!("  - Parallel connections must be 1-128");
            eprintln!("  - Influx URLs must start with http:// or https://");
        }
        AppError::Runtime(_) => {
            eprintln!();
            eprintln!("Probe runtime help:");
            eprintln!("  - Install docker or podman, or");
            eprintln!("  - Install iperf3/netperf locally and pass --nocontainer");
        }
        AppError::Io(_) => {
            eprintln!();
            eprintln!("I/O help:");
            eprintln!("  - Check that the configuration file is readable");
        }
        _ => {}
    }
}
