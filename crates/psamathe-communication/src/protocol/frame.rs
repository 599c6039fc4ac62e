//! Wire frames
//!
//! The device speaks newline-terminated ASCII. Outbound command frames
//! carry a sequence number, the step deltas for both motors, and an XOR
//! checksum:
//!
//! ```text
//! N<seq> R<rotation_steps> I<inout_steps>*<checksum>\n
//! ```
//!
//! The checksum is the XOR of every byte before the `*`, rendered as two
//! uppercase hex digits. Inbound acknowledgments echo the sequence
//! number: `ok N<seq>` on success, `err N<seq> <code>` on failure. Any
//! other line (boot banner, debug chatter) is passed through as a
//! message.

use psamathe_core::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One flow-controlled motion command
///
/// `target` is the chunk's end position in table space; it never goes on
/// the wire (the device works in step deltas) but drives progress
/// reporting once the command is acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Sequence number, unique and monotonically increasing within a job
    pub seq: u32,
    /// Chunk end position in table space
    pub target: Point,
    /// Rotation motor steps for this chunk
    pub rotation_steps: i32,
    /// In-out motor steps for this chunk, compensation applied
    pub inout_steps: i32,
}

impl MotionCommand {
    /// Render the wire frame, terminator included
    ///
    /// Deterministic: a retransmission encodes to exactly the same
    /// bytes as the original.
    pub fn to_frame(&self) -> String {
        let body = format!("N{} R{} I{}", self.seq, self.rotation_steps, self.inout_steps);
        format!("{}*{:02X}\n", body, checksum(body.as_bytes()))
    }

    /// Frame bytes for the transport
    pub fn encode(&self) -> Vec<u8> {
        self.to_frame().into_bytes()
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N{} R{} I{} -> {}",
            self.seq, self.rotation_steps, self.inout_steps, self.target
        )
    }
}

/// XOR checksum over a frame body
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// An acknowledgment from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckFrame {
    /// Sequence number being acknowledged
    pub seq: u32,
    /// Whether the device executed the command
    pub ok: bool,
    /// Device error code; zero on success
    pub code: u32,
}

/// A parsed inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Acknowledgment, success or failure
    Ack(AckFrame),
    /// Any other line from the device
    Message(String),
}

/// Incremental line parser for the inbound byte stream
///
/// Bytes arrive in arbitrary slices; the parser buffers until a newline
/// and classifies each complete line.
#[derive(Debug, Default)]
pub struct ResponseParser {
    buffer: String,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes; returns every response completed by them
    pub fn push_bytes(&mut self, data: &[u8]) -> Vec<Response> {
        self.buffer.push_str(&String::from_utf8_lossy(data));

        let mut responses = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(response) = Self::parse_line(line.trim()) {
                responses.push(response);
            }
        }
        responses
    }

    /// Classify a complete line
    fn parse_line(line: &str) -> Option<Response> {
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix("ok N") {
            if let Ok(seq) = rest.trim().parse::<u32>() {
                return Some(Response::Ack(AckFrame {
                    seq,
                    ok: true,
                    code: 0,
                }));
            }
        }

        if let Some(rest) = line.strip_prefix("err N") {
            let mut parts = rest.split_whitespace();
            if let Some(Ok(seq)) = parts.next().map(str::parse::<u32>) {
                let code = parts.next().and_then(|c| c.parse().ok()).unwrap_or(0);
                return Some(Response::Ack(AckFrame {
                    seq,
                    ok: false,
                    code,
                }));
            }
        }

        Some(Response::Message(line.to_string()))
    }
}
