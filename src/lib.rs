//! # Psamathe
//!
//! Host-side controller for a two-axis kinetic sand table. The table is
//! a polar machine (rotating platter + in-out arm) driven by a
//! microcontroller over a serial link; this crate streams flow-controlled
//! motion commands to it and traces the drawn path.
//!
//! ## Architecture
//!
//! Psamathe is organized as a workspace with multiple crates:
//!
//! 1. **psamathe-core** - Core types, errors, path store, job events
//! 2. **psamathe-communication** - Serial transport, wire protocol, sequencing engine
//! 3. **psamathe-settings** - Configuration and persistence
//! 4. **psamathe-visualizer** - Path trace model and SVG rendering
//! 5. **psamathe** - Main binary that integrates all crates
//!
//! ## Protocol
//!
//! Commands carry a sequence number and an XOR checksum; the device
//! acknowledges each one before the next is sent (single-credit flow
//! control). Long segments are chunked to bound per-command execution
//! time. Lost acknowledgments are retried on a budget; a mismatched
//! acknowledgment halts the job rather than guessing.

pub use psamathe_core::{
    wrap_degrees, Error, EventDispatcher, JobEvent, JobState, JobTotals, LinkError, Path,
    PathError, Point, PolarPoint, ProtocolError, Result, TableGeometry,
};

pub use psamathe_communication::{
    chunk_count, encode_segment, list_ports, spawn, AckFrame, Communicator, ConnectionParams,
    EngineEffect, JobHandle, MotionCommand, NoOpCommunicator, ProtocolConfig, ProtocolEngine,
    Response, ResponseParser, RunnerConfig, SerialCommunicator, SerialPortInfo, SimulatedPeer,
};

pub use psamathe_settings::{
    Config, ConnectionSettings, MotionSettings, SettingsError, TableSettings,
};

pub use psamathe_visualizer::PathTrace;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output on stderr (stdout stays clean for command output)
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
