//! Motion sequencing protocol
//!
//! Everything above raw bytes: the wire frame grammar, the segment
//! encoder, the single-credit sequencing engine, and the control loop
//! that drives them against a transport.

pub mod encoder;
pub mod engine;
pub mod frame;
pub mod runner;

pub use encoder::{chunk_count, encode_segment};
pub use engine::{EngineEffect, ProtocolConfig, ProtocolEngine};
pub use frame::{checksum, AckFrame, MotionCommand, Response, ResponseParser};
pub use runner::{spawn, JobHandle, RunnerConfig};
