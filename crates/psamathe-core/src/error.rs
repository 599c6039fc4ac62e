//! Error handling for Psamathe
//!
//! Provides error types for all layers of the controller:
//! - Path errors (validation and access of the loaded point sequence)
//! - Link errors (serial channel acquisition and I/O)
//! - Protocol errors (sequencing/handshake faults)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Path error type
///
/// Errors raised while loading or accessing the point sequence of a job.
/// Load-time variants reject the path before a job ever starts; the
/// index variant is a programming-contract violation, not a runtime
/// condition to recover from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    /// A coordinate is NaN or infinite
    #[error("Invalid point at index {index}: ({x}, {y}) is not finite")]
    InvalidPoint {
        /// Index of the offending point in the input sequence.
        index: usize,
        /// The x coordinate as provided.
        x: f64,
        /// The y coordinate as provided.
        y: f64,
    },

    /// A point lies outside the drawable annulus of the table
    #[error(
        "Point at index {index} is outside the workspace: radius {radius_mm:.2}mm not in [{inner_mm:.1}, {outer_mm:.1}]"
    )]
    OutsideWorkspace {
        /// Index of the offending point in the input sequence.
        index: usize,
        /// Radial distance of the point from the table centre.
        radius_mm: f64,
        /// Inner (un-drawable) radius of the table.
        inner_mm: f64,
        /// Outer boundary radius of the table.
        outer_mm: f64,
    },

    /// Indexed access outside `[0, len)`
    #[error("Path index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of points in the path.
        len: usize,
    },

    /// The source representation could not be parsed into points
    #[error("Failed to parse path: {reason}")]
    ParseError {
        /// Why the source could not be parsed.
        reason: String,
    },
}

/// Link error type
///
/// Errors related to the serial channel to the table's microcontroller.
/// All of these are fatal to the attempted operation and surfaced to the
/// caller; the link layer never retries on its own.
#[derive(Error, Debug, Clone)]
pub enum LinkError {
    /// Port not found on this system
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to acquire the channel
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Operation attempted without an open channel
    #[error("Link not connected")]
    NotConnected,

    /// Read deadline expired with no data
    #[error("Receive timed out after {timeout_ms}ms")]
    ReceiveTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Byte-level I/O failure on an open channel
    #[error("Link I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Protocol error type
///
/// Errors raised by the sequencing/handshake state machine. Timeout
/// exhaustion and any host/peer disagreement halt the job; they are never
/// silently corrected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Retry budget spent without an acknowledgment
    #[error("No acknowledgment for command {seq} after {attempts} transmissions ({elapsed_ms}ms)")]
    AckTimeout {
        /// Sequence number of the unacknowledged command.
        seq: u32,
        /// Total milliseconds since the command was first transmitted.
        elapsed_ms: u64,
        /// How many times the command was transmitted.
        attempts: u32,
    },

    /// Acknowledgment sequence number does not match the in-flight command
    #[error("Protocol desync: ack for {received} while {in_flight:?} in flight")]
    Desync {
        /// Sequence number the host was waiting on, if any.
        in_flight: Option<u32>,
        /// Sequence number the peer acknowledged.
        received: u32,
    },

    /// Peer reported failure for the in-flight command
    #[error("Command {seq} rejected by device (code {code})")]
    CommandRejected {
        /// Sequence number of the rejected command.
        seq: u32,
        /// Device-reported error code.
        code: u32,
    },

    /// Control request not valid in the current state
    #[error("Invalid transition: {requested} while {current}")]
    InvalidTransition {
        /// The current engine state name.
        current: String,
        /// The requested operation.
        requested: String,
    },

    /// The link failed mid-job
    #[error("Link failed during job: {reason}")]
    LinkFailed {
        /// Description of the underlying link failure.
        reason: String,
    },
}

/// Main error type for Psamathe
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Path error
    #[error(transparent)]
    Path(#[from] PathError),

    /// Link error
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Link(LinkError::ReceiveTimeout { .. })
                | Error::Protocol(ProtocolError::AckTimeout { .. })
        )
    }

    /// Check if this is a link error
    pub fn is_link_error(&self) -> bool {
        matches!(self, Error::Link(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
