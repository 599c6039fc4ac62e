//! Simulated peer
//!
//! A loopback transport that behaves like a well-mannered controller
//! board: every well-formed command frame written to it is acknowledged
//! on the next read. Used for dry runs and tests; no motors move.

use crate::communication::{Communicator, ConnectionParams};
use crate::protocol::frame::checksum;
use psamathe_core::Result;
use std::collections::VecDeque;

/// Transport that acknowledges every frame it receives
#[derive(Debug, Default)]
pub struct SimulatedPeer {
    inbox: VecDeque<u8>,
    connected: bool,
}

impl SimulatedPeer {
    /// Create a new simulated peer
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an outbound frame and produce the matching ack line
    fn ack_for(frame: &str) -> Option<String> {
        let frame = frame.trim_end();
        let (body, check) = frame.rsplit_once('*')?;
        let expected = u8::from_str_radix(check, 16).ok()?;
        if checksum(body.as_bytes()) != expected {
            return Some("err N0 1\n".to_string());
        }
        let seq: u32 = body.strip_prefix('N')?.split_whitespace().next()?.parse().ok()?;
        Some(format!("ok N{}\n", seq))
    }
}

impl Communicator for SimulatedPeer {
    fn connect(&mut self, _params: &ConnectionParams) -> Result<()> {
        self.connected = true;
        self.inbox.extend(b"psamathe table simulator ready\n");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.inbox.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        for frame in String::from_utf8_lossy(data).split_inclusive('\n') {
            if let Some(ack) = Self::ack_for(frame) {
                self.inbox.extend(ack.as_bytes());
            }
        }
        Ok(data.len())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        Ok(self.inbox.drain(..).collect())
    }
}
