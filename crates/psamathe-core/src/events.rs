//! Event system for job progress reporting
//!
//! Provides:
//! - Event types for job progress, completion, and faults
//! - Event dispatcher for publishing events to subscribers
//!
//! The dispatcher is a bounded broadcast channel: a slow subscriber lags
//! and loses the oldest events instead of ever blocking the control loop.
//! Reporters own their own copy of last-known position; they never read
//! engine state directly.

use crate::error::ProtocolError;
use crate::geometry::Point;
use crate::job::{JobState, JobTotals};
use tokio::sync::broadcast;

/// Job event types
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A command was acknowledged; the magnet reached a chunk target
    Progress {
        /// Sequence number of the acknowledged command.
        seq: u32,
        /// Position the device confirmed reaching.
        position: Point,
        /// Index of the segment this chunk belongs to.
        segment: usize,
        /// Total number of segments in the path.
        total_segments: usize,
    },
    /// The job traversed every segment
    Completed {
        /// Step and command totals for the whole job.
        totals: JobTotals,
    },
    /// The job halted on a fault; terminal until a new start
    Fault {
        /// Last sequence number in flight, if any.
        seq: Option<u32>,
        /// The underlying protocol error.
        error: ProtocolError,
    },
    /// The sequencing state machine entered a new resting state
    StateChanged(JobState),
}

impl std::fmt::Display for JobEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEvent::Progress {
                seq,
                position,
                segment,
                total_segments,
            } => write!(
                f,
                "Progress: seq {} at {} (segment {}/{})",
                seq,
                position,
                segment + 1,
                total_segments
            ),
            JobEvent::Completed { totals } => write!(
                f,
                "Completed: {} commands, {} rot / {} in-out steps",
                totals.commands_sent, totals.rotation_steps, totals.inout_steps
            ),
            JobEvent::Fault { seq, error } => match seq {
                Some(seq) => write!(f, "Fault at seq {}: {}", seq, error),
                None => write!(f, "Fault: {}", error),
            },
            JobEvent::StateChanged(state) => write!(f, "State: {}", state),
        }
    }
}

/// Event dispatcher for publishing job events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for job events.
    tx: broadcast::Sender<JobEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Create a new event dispatcher with default buffer size
    pub fn default_with_buffer() -> Self {
        Self::new(100)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of receivers, or an error when none are
    /// listening. Publishing never blocks.
    pub fn publish(
        &self,
        event: JobEvent,
    ) -> Result<usize, broadcast::error::SendError<JobEvent>> {
        self.tx.send(event)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::default_with_buffer()
    }
}
