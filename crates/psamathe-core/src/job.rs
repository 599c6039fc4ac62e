//! Job state
//!
//! One job is one traversal of a path. All motion and reporting behavior
//! is a function of the current state and an inbound event; the
//! transition logic itself lives in the protocol engine.

use serde::{Deserialize, Serialize};

/// States of a job's sequencing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// No job active
    Idle,
    /// Command transmitted, awaiting acknowledgment
    Sending,
    /// Acknowledgment received, preparing the next command
    Advancing,
    /// Held by user request; nothing in flight
    Paused,
    /// All segments traversed
    Completed,
    /// Halted on a protocol or link fault; terminal for the job
    Faulted,
}

impl JobState {
    /// Check if a job is currently traversing its path
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Sending | JobState::Advancing | JobState::Paused)
    }

    /// Check if this state ends the job
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Faulted)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Sending => write!(f, "Sending"),
            JobState::Advancing => write!(f, "Advancing"),
            JobState::Paused => write!(f, "Paused"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Cumulative motor-step accounting for one job
///
/// Logical steps, before any wiring inversion the firmware applies.
/// Useful for drift diagnostics: a completed job whose totals do not
/// return to zero on a closed path indicates lost steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTotals {
    /// Total rotation steps commanded
    pub rotation_steps: i64,
    /// Total in-out steps commanded (after compensation)
    pub inout_steps: i64,
    /// Total commands transmitted, retransmissions excluded
    pub commands_sent: u32,
}
