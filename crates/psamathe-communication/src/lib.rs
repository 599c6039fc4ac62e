//! # Psamathe Communication
//!
//! Serial link and motion sequencing protocol for the Psamathe sand
//! table controller. The transport layer moves bytes; the protocol layer
//! turns a path into a flow-controlled stream of acknowledged motion
//! commands and reports progress as the device executes them.

pub mod communication;
pub mod protocol;

pub use communication::{
    serial::{list_ports, SerialCommunicator, SerialPortInfo},
    simulator::SimulatedPeer,
    Communicator, ConnectionParams, NoOpCommunicator,
};

pub use protocol::{
    chunk_count, encode_segment, spawn, AckFrame, EngineEffect, JobHandle, MotionCommand,
    ProtocolConfig, ProtocolEngine, Response, ResponseParser, RunnerConfig,
};
