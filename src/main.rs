//! Psamathe command-line entry point
//!
//! Loads configuration, opens the link to the table, and drives a job
//! from a path file to completion while printing progress and writing
//! an optional SVG trace.

use anyhow::Context;
use clap::{Parser, Subcommand};
use psamathe::{
    init_logging, list_ports, spawn, Communicator, Config, ConnectionParams, JobEvent, Path,
    PathTrace, ProtocolConfig, RunnerConfig, SerialCommunicator, SimulatedPeer,
};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "psamathe", version, about = "Kinetic sand table controller")]
struct Cli {
    /// Configuration file (JSON or TOML); defaults to the platform
    /// config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a path file to the table
    Run {
        /// JSON file of [x, y] millimetre pairs
        path_file: PathBuf,

        /// Serial port override
        #[arg(long)]
        port: Option<String>,

        /// Baud rate override
        #[arg(long)]
        baud: Option<u32>,

        /// Drive the built-in simulated peer instead of hardware
        #[arg(long)]
        dry_run: bool,

        /// Write an SVG of planned vs drawn path on exit
        #[arg(long)]
        trace_svg: Option<PathBuf>,
    },
    /// List candidate serial ports
    ListPorts,
    /// Print the configuration file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default().context("loading default configuration")?,
    };

    match cli.command {
        Command::Run {
            path_file,
            port,
            baud,
            dry_run,
            trace_svg,
        } => run(config, path_file, port, baud, dry_run, trace_svg).await,
        Command::ListPorts => {
            let ports = list_ports()?;
            if ports.is_empty() {
                println!("No candidate ports found");
            }
            for info in ports {
                println!("{}\t{}", info.port_name, info.description);
            }
            Ok(())
        }
        Command::ConfigPath => {
            println!("{}", Config::default_path()?.display());
            Ok(())
        }
    }
}

async fn run(
    config: Config,
    path_file: PathBuf,
    port: Option<String>,
    baud: Option<u32>,
    dry_run: bool,
    trace_svg: Option<PathBuf>,
) -> anyhow::Result<()> {
    let geometry = config.table.geometry();
    let path = Path::from_json_file(&path_file, &geometry)
        .with_context(|| format!("loading {}", path_file.display()))?;
    tracing::info!(
        points = path.len(),
        segments = path.segment_count(),
        "Path loaded"
    );

    let params = ConnectionParams {
        port: resolve_port(port.unwrap_or_else(|| config.connection.port.clone()), dry_run)?,
        baud_rate: baud.unwrap_or(config.connection.baud_rate),
        timeout_ms: config.connection.timeout_ms,
    };

    let mut transport: Box<dyn Communicator> = if dry_run {
        Box::new(SimulatedPeer::new())
    } else {
        Box::new(SerialCommunicator::new())
    };
    transport
        .connect(&params)
        .with_context(|| format!("opening {}", params.port))?;

    let runner_config = RunnerConfig {
        protocol: ProtocolConfig {
            max_step_distance_mm: config.motion.max_step_distance_mm,
            ack_timeout: config.motion.ack_timeout(),
            retry_budget: config.motion.retry_budget,
        },
        ..RunnerConfig::default()
    };

    let handle = spawn(transport, runner_config, geometry);
    let mut rx = handle.subscribe();
    let mut trace = PathTrace::with_plan(path.points().to_vec());

    handle.start(path).await?;

    let mut failure: Option<String> = None;
    loop {
        match rx.recv().await {
            Ok(event) => {
                trace.apply(&event);
                match &event {
                    JobEvent::Completed { .. } => {
                        tracing::info!("{}", event);
                        break;
                    }
                    JobEvent::Fault { .. } => {
                        tracing::error!("{}", event);
                        failure = Some(event.to_string());
                        break;
                    }
                    _ => tracing::info!("{}", event),
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(dropped = n, "Renderer fell behind the event stream")
            }
            Err(RecvError::Closed) => break,
        }
    }

    if let Some(svg_path) = trace_svg {
        let svg = trace.to_svg(geometry.workspace_radius_mm, geometry.inner_radius_mm);
        std::fs::write(&svg_path, svg)
            .with_context(|| format!("writing {}", svg_path.display()))?;
        tracing::info!("Trace written to {}", svg_path.display());
    }

    handle.shutdown().await;

    match failure {
        Some(message) => anyhow::bail!("job failed: {message}"),
        None => Ok(()),
    }
}

/// Turn the configured port name into a concrete device path
///
/// "Auto" picks the first candidate port on the system.
fn resolve_port(configured: String, dry_run: bool) -> anyhow::Result<String> {
    if dry_run {
        return Ok("simulator".to_string());
    }
    if !configured.eq_ignore_ascii_case("auto") {
        return Ok(configured);
    }
    let ports = list_ports()?;
    match ports.first() {
        Some(info) => {
            tracing::info!("Auto-selected {} ({})", info.port_name, info.description);
            Ok(info.port_name.clone())
        }
        None => anyhow::bail!("no candidate serial ports found; pass --port"),
    }
}
