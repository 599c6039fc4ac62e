//! Protocol engine
//!
//! The sequencing/handshake state machine for one job. Pure: no I/O and
//! no clock. Inbound events (control requests, acknowledgments, timeout
//! expiry) go in; effects (frames to transmit, events to publish) come
//! out, and the control loop executes them.
//!
//! Flow control is single-credit: at most one command is ever
//! unacknowledged. The cursor only advances on a successful matching
//! acknowledgment; a mismatched acknowledgment is a desync and halts the
//! job rather than guessing at recovery.

use crate::protocol::encoder::encode_segment;
use crate::protocol::frame::{AckFrame, MotionCommand};
use psamathe_core::{JobEvent, JobState, JobTotals, Path, ProtocolError, TableGeometry};
use std::collections::VecDeque;
use std::time::Duration;

/// Protocol tuning knobs
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Maximum travel per command, in mm
    pub max_step_distance_mm: f64,
    /// How long to wait for an acknowledgment before retrying
    pub ack_timeout: Duration,
    /// Maximum transmissions of one command before faulting
    pub retry_budget: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_step_distance_mm: 4.0,
            ack_timeout: Duration::from_millis(2000),
            retry_budget: 3,
        }
    }
}

/// Something the control loop must do on the engine's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEffect {
    /// Write this command's frame to the link
    Transmit(MotionCommand),
    /// Publish this event to subscribers
    Notify(JobEvent),
}

/// A command planned but not yet transmitted
#[derive(Debug, Clone)]
struct PlannedCommand {
    segment: usize,
    command: MotionCommand,
}

/// The command awaiting acknowledgment
#[derive(Debug, Clone)]
struct AckRecord {
    segment: usize,
    command: MotionCommand,
    /// Times this command has been transmitted
    attempts: u32,
}

/// The point-to-point sequencing state machine
pub struct ProtocolEngine {
    config: ProtocolConfig,
    geometry: TableGeometry,
    state: JobState,
    pending: VecDeque<PlannedCommand>,
    in_flight: Option<AckRecord>,
    total_segments: usize,
    pause_pending: bool,
    totals: JobTotals,
}

impl ProtocolEngine {
    /// Create an idle engine
    pub fn new(config: ProtocolConfig, geometry: TableGeometry) -> Self {
        Self {
            config,
            geometry,
            state: JobState::Idle,
            pending: VecDeque::new(),
            in_flight: None,
            total_segments: 0,
            pause_pending: false,
            totals: JobTotals::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Sequence number awaiting acknowledgment, if any
    pub fn in_flight_seq(&self) -> Option<u32> {
        self.in_flight.as_ref().map(|r| r.command.seq)
    }

    /// Step totals accumulated so far in this job
    pub fn totals(&self) -> JobTotals {
        self.totals
    }

    /// Begin a fresh job over `path`
    ///
    /// The whole path is encoded up front: sequence numbers are assigned
    /// once and never reused, and a retransmission later replays stored
    /// bytes rather than re-deriving them. Paths with fewer than two
    /// points (or only zero-length segments) complete immediately with
    /// nothing transmitted.
    ///
    /// Returns `InvalidTransition` while a job is active; the running
    /// job is unaffected.
    pub fn start(&mut self, path: &Path) -> Result<Vec<EngineEffect>, ProtocolError> {
        if self.state.is_active() {
            return Err(ProtocolError::InvalidTransition {
                current: self.state.to_string(),
                requested: "start".to_string(),
            });
        }

        self.reset_job();
        self.total_segments = path.segment_count();

        let mut seq = 1u32;
        for (segment, (from, to)) in path.segments().enumerate() {
            let commands = encode_segment(
                from,
                to,
                seq,
                self.config.max_step_distance_mm,
                &self.geometry,
            );
            seq += commands.len() as u32;
            self.pending
                .extend(commands.into_iter().map(|command| PlannedCommand {
                    segment,
                    command,
                }));
        }

        let mut effects = Vec::new();
        if self.pending.is_empty() {
            tracing::info!("Path produces no motion; job complete");
            self.state = JobState::Completed;
            effects.push(EngineEffect::Notify(JobEvent::StateChanged(
                JobState::Completed,
            )));
            effects.push(EngineEffect::Notify(JobEvent::Completed {
                totals: self.totals,
            }));
        } else {
            tracing::info!(
                segments = self.total_segments,
                commands = self.pending.len(),
                "Job started"
            );
            effects.push(EngineEffect::Notify(JobEvent::StateChanged(
                JobState::Sending,
            )));
            self.transmit_next(&mut effects);
        }
        Ok(effects)
    }

    /// Handle an acknowledgment from the device
    pub fn on_ack(&mut self, ack: AckFrame) -> Vec<EngineEffect> {
        if !self.state.is_active() {
            tracing::warn!(seq = ack.seq, "Ignoring ack with no job active");
            return Vec::new();
        }

        let record = match self.in_flight.take() {
            Some(record) if record.command.seq == ack.seq => record,
            other => {
                // Out-of-order or stale ack: the device and host disagree
                // about what was executed. Fatal, never auto-corrected.
                let in_flight = other.as_ref().map(|r| r.command.seq);
                self.in_flight = other;
                return self.fault(ProtocolError::Desync {
                    in_flight,
                    received: ack.seq,
                });
            }
        };

        if !ack.ok {
            let seq = record.command.seq;
            self.in_flight = Some(record);
            return self.fault(ProtocolError::CommandRejected {
                seq,
                code: ack.code,
            });
        }

        self.state = JobState::Advancing;
        self.totals.rotation_steps += i64::from(record.command.rotation_steps);
        self.totals.inout_steps += i64::from(record.command.inout_steps);

        let mut effects = vec![EngineEffect::Notify(JobEvent::Progress {
            seq: record.command.seq,
            position: record.command.target,
            segment: record.segment,
            total_segments: self.total_segments,
        })];

        if self.pending.is_empty() {
            tracing::info!(commands = self.totals.commands_sent, "Job complete");
            self.state = JobState::Completed;
            effects.push(EngineEffect::Notify(JobEvent::StateChanged(
                JobState::Completed,
            )));
            effects.push(EngineEffect::Notify(JobEvent::Completed {
                totals: self.totals,
            }));
        } else if self.pause_pending {
            self.pause_pending = false;
            self.state = JobState::Paused;
            effects.push(EngineEffect::Notify(JobEvent::StateChanged(
                JobState::Paused,
            )));
        } else {
            self.transmit_next(&mut effects);
        }
        effects
    }

    /// Handle expiry of the acknowledgment deadline
    ///
    /// `elapsed` is the time since the command was first transmitted and
    /// is carried into the fault event when the budget is spent.
    pub fn on_timeout(&mut self, elapsed: Duration) -> Vec<EngineEffect> {
        if self.state != JobState::Sending {
            return Vec::new();
        }
        let Some(record) = self.in_flight.as_mut() else {
            return Vec::new();
        };

        if record.attempts < self.config.retry_budget {
            record.attempts += 1;
            tracing::warn!(
                seq = record.command.seq,
                attempt = record.attempts,
                budget = self.config.retry_budget,
                "Ack timeout, retransmitting"
            );
            return vec![EngineEffect::Transmit(record.command.clone())];
        }

        let error = ProtocolError::AckTimeout {
            seq: record.command.seq,
            elapsed_ms: elapsed.as_millis() as u64,
            attempts: record.attempts,
        };
        self.fault(error)
    }

    /// Handle a link failure reported by the control loop
    pub fn on_link_error(&mut self, reason: &str) -> Vec<EngineEffect> {
        if !self.state.is_active() {
            return Vec::new();
        }
        self.fault(ProtocolError::LinkFailed {
            reason: reason.to_string(),
        })
    }

    /// Request a pause
    ///
    /// Honored at the next step boundary: an in-flight command completes
    /// or times out under normal rules, and no new command is issued
    /// until resumed. Pausing with no job active is a no-op.
    pub fn pause(&mut self) -> Vec<EngineEffect> {
        match self.state {
            JobState::Sending | JobState::Advancing => {
                self.pause_pending = true;
                Vec::new()
            }
            JobState::Paused => Vec::new(),
            _ => {
                tracing::debug!(state = %self.state, "Pause ignored");
                Vec::new()
            }
        }
    }

    /// Resume a paused job exactly where it left off
    ///
    /// Already-acknowledged commands are never re-sent.
    pub fn resume(&mut self) -> Vec<EngineEffect> {
        if self.pause_pending {
            self.pause_pending = false;
            return Vec::new();
        }
        if self.state != JobState::Paused {
            tracing::debug!(state = %self.state, "Resume ignored");
            return Vec::new();
        }

        let mut effects = vec![EngineEffect::Notify(JobEvent::StateChanged(
            JobState::Sending,
        ))];
        self.transmit_next(&mut effects);
        effects
    }

    /// Abort the job and return to idle
    ///
    /// Any in-flight command is abandoned (no further retries) and the
    /// remaining cursor state discarded. This is also the way out of
    /// `Faulted`.
    pub fn stop(&mut self) -> Vec<EngineEffect> {
        if self.state == JobState::Idle {
            return Vec::new();
        }
        tracing::info!(state = %self.state, "Job stopped");
        self.reset_job();
        self.state = JobState::Idle;
        vec![EngineEffect::Notify(JobEvent::StateChanged(JobState::Idle))]
    }

    /// Move the next planned command into flight
    fn transmit_next(&mut self, effects: &mut Vec<EngineEffect>) {
        if let Some(planned) = self.pending.pop_front() {
            self.state = JobState::Sending;
            self.totals.commands_sent += 1;
            effects.push(EngineEffect::Transmit(planned.command.clone()));
            self.in_flight = Some(AckRecord {
                segment: planned.segment,
                command: planned.command,
                attempts: 1,
            });
        }
    }

    /// Halt the job on a protocol fault; terminal until a new start
    fn fault(&mut self, error: ProtocolError) -> Vec<EngineEffect> {
        let seq = self.in_flight_seq();
        tracing::error!(?seq, %error, "Job faulted");
        self.reset_job();
        self.state = JobState::Faulted;
        vec![
            EngineEffect::Notify(JobEvent::StateChanged(JobState::Faulted)),
            EngineEffect::Notify(JobEvent::Fault { seq, error }),
        ]
    }

    /// Clear all per-job state
    fn reset_job(&mut self) {
        self.pending.clear();
        self.in_flight = None;
        self.total_segments = 0;
        self.pause_pending = false;
        self.totals = JobTotals::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psamathe_core::Point;

    /// Geometry with the annulus opened up so tests can use simple
    /// coordinates like the origin.
    fn open_geometry() -> TableGeometry {
        TableGeometry {
            inner_radius_mm: 0.0,
            workspace_radius_mm: 500.0,
            ..TableGeometry::default()
        }
    }

    fn engine() -> ProtocolEngine {
        ProtocolEngine::new(ProtocolConfig::default(), open_geometry())
    }

    fn path(points: &[(f64, f64)]) -> Path {
        Path::load(
            points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            &open_geometry(),
        )
        .unwrap()
    }

    fn ack(seq: u32) -> AckFrame {
        AckFrame {
            seq,
            ok: true,
            code: 0,
        }
    }

    fn transmits(effects: &[EngineEffect]) -> Vec<MotionCommand> {
        effects
            .iter()
            .filter_map(|e| match e {
                EngineEffect::Transmit(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    fn has_completed(effects: &[EngineEffect]) -> bool {
        effects
            .iter()
            .any(|e| matches!(e, EngineEffect::Notify(JobEvent::Completed { .. })))
    }

    #[test]
    fn test_empty_path_completes_immediately() {
        let mut engine = engine();
        let effects = engine.start(&path(&[])).unwrap();
        assert_eq!(engine.state(), JobState::Completed);
        assert!(transmits(&effects).is_empty());
        assert!(has_completed(&effects));
    }

    #[test]
    fn test_single_point_path_completes_immediately() {
        let mut engine = engine();
        let effects = engine.start(&path(&[(10.0, 10.0)])).unwrap();
        assert_eq!(engine.state(), JobState::Completed);
        assert!(transmits(&effects).is_empty());
    }

    #[test]
    fn test_duplicate_points_do_not_stall() {
        let mut engine = engine();
        // All segments zero-length: completes immediately.
        let effects = engine
            .start(&path(&[(10.0, 0.0), (10.0, 0.0), (10.0, 0.0)]))
            .unwrap();
        assert_eq!(engine.state(), JobState::Completed);
        assert!(transmits(&effects).is_empty());

        // A duplicate in the middle is skipped without a command.
        let mut engine = self::engine();
        let mut effects = engine
            .start(&path(&[(10.0, 0.0), (12.0, 0.0), (12.0, 0.0), (14.0, 0.0)]))
            .unwrap();
        let mut sent = 0;
        loop {
            let txs = transmits(&effects);
            if txs.is_empty() {
                break;
            }
            sent += txs.len();
            effects = engine.on_ack(ack(txs[0].seq));
        }
        assert_eq!(sent, 2);
        assert_eq!(engine.state(), JobState::Completed);
    }

    #[test]
    fn test_ten_mm_segment_walks_in_three_chunks() {
        // [(0,0) -> (10,0)] with max_step 4 chunks to (4,0), (8,0), (10,0),
        // one ack gating each transmission.
        let mut engine = engine();
        let effects = engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();

        let first = transmits(&effects);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].seq, 1);
        assert!((first[0].target.x - 4.0).abs() < 1e-9);
        assert_eq!(engine.state(), JobState::Sending);

        let effects = engine.on_ack(ack(1));
        let second = transmits(&effects);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].seq, 2);
        assert!((second[0].target.x - 8.0).abs() < 1e-9);

        let effects = engine.on_ack(ack(2));
        let third = transmits(&effects);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].seq, 3);
        assert!((third[0].target.x - 10.0).abs() < 1e-9);

        let effects = engine.on_ack(ack(3));
        assert!(transmits(&effects).is_empty());
        assert!(has_completed(&effects));
        assert_eq!(engine.state(), JobState::Completed);
        assert_eq!(engine.totals().commands_sent, 3);
    }

    #[test]
    fn test_command_count_matches_chunk_sum() {
        // Segments of 10mm, 0mm, and 3mm at max_step 4 -> 3 + 0 + 1.
        let mut engine = engine();
        let mut effects = engine
            .start(&path(&[
                (0.0, 0.0),
                (10.0, 0.0),
                (10.0, 0.0),
                (13.0, 0.0),
            ]))
            .unwrap();
        let mut sent = Vec::new();
        loop {
            let txs = transmits(&effects);
            if txs.is_empty() {
                break;
            }
            sent.extend(txs.iter().map(|c| c.seq));
            effects = engine.on_ack(ack(txs[0].seq));
        }
        assert_eq!(sent, vec![1, 2, 3, 4]);
        assert_eq!(engine.state(), JobState::Completed);
    }

    #[test]
    fn test_mismatched_ack_faults() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        let effects = engine.on_ack(ack(5));
        assert_eq!(engine.state(), JobState::Faulted);
        assert!(transmits(&effects).is_empty());
        assert!(effects.iter().any(|e| matches!(
            e,
            EngineEffect::Notify(JobEvent::Fault {
                error: ProtocolError::Desync {
                    in_flight: Some(1),
                    received: 5
                },
                ..
            })
        )));

        // Nothing further happens on later acks.
        assert!(engine.on_ack(ack(1)).is_empty());
    }

    #[test]
    fn test_rejected_command_faults() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        let effects = engine.on_ack(AckFrame {
            seq: 1,
            ok: false,
            code: 4,
        });
        assert_eq!(engine.state(), JobState::Faulted);
        assert!(effects.iter().any(|e| matches!(
            e,
            EngineEffect::Notify(JobEvent::Fault {
                error: ProtocolError::CommandRejected { seq: 1, code: 4 },
                ..
            })
        )));
    }

    #[test]
    fn test_retry_budget_and_fault() {
        // retry_budget 3: transmissions at start, timeout 1, timeout 2;
        // the third timeout finds the budget spent and faults.
        let mut engine = engine();
        let effects = engine.start(&path(&[(0.0, 0.0), (4.0, 0.0)])).unwrap();
        let original = transmits(&effects);
        assert_eq!(original.len(), 1);

        let retry1 = transmits(&engine.on_timeout(Duration::from_millis(100)));
        assert_eq!(retry1, original);
        let retry2 = transmits(&engine.on_timeout(Duration::from_millis(200)));
        assert_eq!(retry2, original);
        assert_eq!(retry1[0].encode(), original[0].encode());

        let effects = engine.on_timeout(Duration::from_millis(300));
        assert!(transmits(&effects).is_empty());
        assert_eq!(engine.state(), JobState::Faulted);
        assert!(effects.iter().any(|e| matches!(
            e,
            EngineEffect::Notify(JobEvent::Fault {
                error: ProtocolError::AckTimeout {
                    seq: 1,
                    attempts: 3,
                    ..
                },
                ..
            })
        )));
    }

    #[test]
    fn test_pause_defers_next_transmission() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();

        // Pause while command 1 is in flight: nothing happens yet.
        assert!(engine.pause().is_empty());
        assert_eq!(engine.state(), JobState::Sending);

        // The ack completes the in-flight command, then the engine rests.
        let effects = engine.on_ack(ack(1));
        assert!(transmits(&effects).is_empty());
        assert_eq!(engine.state(), JobState::Paused);

        // Resume picks up at command 2; command 1 is never re-sent.
        let effects = engine.resume();
        let txs = transmits(&effects);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].seq, 2);
        assert_eq!(engine.state(), JobState::Sending);
    }

    #[test]
    fn test_pause_cancelled_before_boundary() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        engine.pause();
        engine.resume();
        // Pause was withdrawn before the ack; streaming continues.
        let effects = engine.on_ack(ack(1));
        assert_eq!(transmits(&effects).len(), 1);
        assert_eq!(engine.state(), JobState::Sending);
    }

    #[test]
    fn test_completion_beats_pause() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (4.0, 0.0)])).unwrap();
        engine.pause();
        let effects = engine.on_ack(ack(1));
        assert_eq!(engine.state(), JobState::Completed);
        assert!(has_completed(&effects));
    }

    #[test]
    fn test_in_flight_times_out_normally_while_pause_pending() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (4.0, 0.0)])).unwrap();
        engine.pause();
        // Retries proceed under normal rules during a pending pause.
        let retry = transmits(&engine.on_timeout(Duration::from_millis(50)));
        assert_eq!(retry.len(), 1);
        let effects = engine.on_ack(ack(1));
        assert_eq!(engine.state(), JobState::Completed);
        assert!(has_completed(&effects));
    }

    #[test]
    fn test_stop_aborts_and_allows_restart() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        let effects = engine.stop();
        assert_eq!(engine.state(), JobState::Idle);
        assert!(effects.iter().any(|e| matches!(
            e,
            EngineEffect::Notify(JobEvent::StateChanged(JobState::Idle))
        )));

        // A stale ack from the aborted command is ignored in Idle.
        assert!(engine.on_ack(ack(1)).is_empty());
        assert_eq!(engine.state(), JobState::Idle);

        // Fresh job starts from seq 1 again.
        let effects = engine.start(&path(&[(0.0, 0.0), (4.0, 0.0)])).unwrap();
        assert_eq!(transmits(&effects)[0].seq, 1);
    }

    #[test]
    fn test_start_while_active_is_rejected() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        let err = engine.start(&path(&[(0.0, 0.0), (4.0, 0.0)])).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidTransition { .. }));
        // The running job is unaffected.
        assert_eq!(engine.state(), JobState::Sending);
        assert_eq!(engine.in_flight_seq(), Some(1));
    }

    #[test]
    fn test_start_after_fault_begins_fresh_job() {
        let mut engine = engine();
        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        engine.on_ack(ack(99));
        assert_eq!(engine.state(), JobState::Faulted);

        let effects = engine.start(&path(&[(0.0, 0.0), (4.0, 0.0)])).unwrap();
        assert_eq!(engine.state(), JobState::Sending);
        assert_eq!(transmits(&effects)[0].seq, 1);
    }

    #[test]
    fn test_timeout_ignored_when_idle_or_paused() {
        let mut engine = engine();
        assert!(engine.on_timeout(Duration::from_millis(10)).is_empty());

        engine.start(&path(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        engine.pause();
        engine.on_ack(ack(1));
        assert_eq!(engine.state(), JobState::Paused);
        // A stale deadline firing while paused must not retransmit.
        assert!(engine.on_timeout(Duration::from_millis(10)).is_empty());
    }

    #[test]
    fn test_totals_accumulate_on_ack() {
        let mut engine = engine();
        let effects = engine.start(&path(&[(10.0, 0.0), (14.0, 0.0)])).unwrap();
        let txs = transmits(&effects);
        let cmd = &txs[0];
        assert_eq!(engine.totals(), JobTotals {
            rotation_steps: 0,
            inout_steps: 0,
            commands_sent: 1
        });
        engine.on_ack(ack(1));
        let totals = engine.totals();
        assert_eq!(totals.rotation_steps, i64::from(cmd.rotation_steps));
        assert_eq!(totals.inout_steps, i64::from(cmd.inout_steps));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        #[derive(Debug, Clone)]
        enum Op {
            AckInFlight,
            AckStale,
            AckReject,
            Timeout,
            Pause,
            Resume,
            Stop,
            Restart,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                8 => Just(Op::AckInFlight),
                1 => Just(Op::AckStale),
                1 => Just(Op::AckReject),
                3 => Just(Op::Timeout),
                2 => Just(Op::Pause),
                2 => Just(Op::Resume),
                1 => Just(Op::Stop),
                1 => Just(Op::Restart),
            ]
        }

        proptest! {
            /// Under any interleaving of acks, timeouts, and control
            /// requests, at most one command is unacknowledged, and a
            /// new sequence number is only transmitted after the
            /// previous one was acknowledged or abandoned.
            #[test]
            fn single_credit_holds(ops in prop::collection::vec(op_strategy(), 1..120)) {
                let mut engine = engine();
                let p = path(&[(0.0, 0.0), (20.0, 0.0), (20.0, 12.0)]);

                let mut outstanding: Option<u32> = None;
                let check = |effects: &[EngineEffect],
                                 outstanding: &mut Option<u32>|
                 -> Result<(), TestCaseError> {
                    for effect in effects {
                        match effect {
                            EngineEffect::Transmit(cmd) => {
                                if let Some(seq) = *outstanding {
                                    prop_assert_eq!(
                                        seq, cmd.seq,
                                        "new command transmitted while another was in flight"
                                    );
                                }
                                *outstanding = Some(cmd.seq);
                            }
                            EngineEffect::Notify(JobEvent::Progress { seq, .. }) => {
                                prop_assert_eq!(*outstanding, Some(*seq));
                                *outstanding = None;
                            }
                            EngineEffect::Notify(JobEvent::StateChanged(
                                JobState::Idle | JobState::Faulted,
                            )) => {
                                // Abandoned in-flight command, if any.
                                *outstanding = None;
                            }
                            _ => {}
                        }
                    }
                    Ok(())
                };

                let effects = engine.start(&p).unwrap();
                check(&effects, &mut outstanding)?;

                for op in ops {
                    let effects = match op {
                        Op::AckInFlight => {
                            let seq = engine.in_flight_seq().unwrap_or(9999);
                            engine.on_ack(AckFrame { seq, ok: true, code: 0 })
                        }
                        Op::AckStale => engine.on_ack(AckFrame {
                            seq: 9999,
                            ok: true,
                            code: 0,
                        }),
                        Op::AckReject => {
                            let seq = engine.in_flight_seq().unwrap_or(9999);
                            engine.on_ack(AckFrame { seq, ok: false, code: 2 })
                        }
                        Op::Timeout => engine.on_timeout(Duration::from_millis(50)),
                        Op::Pause => engine.pause(),
                        Op::Resume => engine.resume(),
                        Op::Stop => engine.stop(),
                        Op::Restart => match engine.start(&p) {
                            Ok(effects) => effects,
                            Err(_) => Vec::new(),
                        },
                    };
                    check(&effects, &mut outstanding)?;

                    // The engine's own bookkeeping agrees with the
                    // effect stream.
                    prop_assert_eq!(engine.in_flight_seq(), outstanding);
                }
            }

            /// Sequence numbers transmitted within one job strictly
            /// increase; only exact retransmissions repeat.
            #[test]
            fn sequence_numbers_monotonic(ops in prop::collection::vec(op_strategy(), 1..120)) {
                let mut engine = engine();
                let p = path(&[(0.0, 0.0), (20.0, 0.0)]);
                let mut last_seen: Option<MotionCommand> = None;

                let check = |effects: &[EngineEffect],
                                 last_seen: &mut Option<MotionCommand>|
                 -> Result<(), TestCaseError> {
                    for effect in effects {
                        match effect {
                            EngineEffect::Transmit(cmd) => {
                                if let Some(prev) = last_seen.as_ref() {
                                    if cmd.seq == prev.seq {
                                        prop_assert_eq!(
                                            &cmd.encode(), &prev.encode(),
                                            "retransmission must be byte-identical"
                                        );
                                    } else {
                                        prop_assert!(cmd.seq > prev.seq);
                                    }
                                }
                                *last_seen = Some(cmd.clone());
                            }
                            // The job ends here; a restart may reuse seq 1.
                            EngineEffect::Notify(JobEvent::StateChanged(JobState::Idle)) => {
                                *last_seen = None;
                            }
                            EngineEffect::Notify(JobEvent::StateChanged(JobState::Faulted)) => {
                                *last_seen = None;
                            }
                            EngineEffect::Notify(JobEvent::Completed { .. }) => {
                                *last_seen = None;
                            }
                            _ => {}
                        }
                    }
                    Ok(())
                };

                let effects = engine.start(&p).unwrap();
                check(&effects, &mut last_seen)?;
                for op in ops {
                    let effects = match op {
                        Op::AckInFlight => {
                            let seq = engine.in_flight_seq().unwrap_or(9999);
                            engine.on_ack(AckFrame { seq, ok: true, code: 0 })
                        }
                        Op::AckStale => engine.on_ack(AckFrame {
                            seq: 9999,
                            ok: true,
                            code: 0,
                        }),
                        Op::AckReject => {
                            let seq = engine.in_flight_seq().unwrap_or(9999);
                            engine.on_ack(AckFrame { seq, ok: false, code: 2 })
                        }
                        Op::Timeout => engine.on_timeout(Duration::from_millis(50)),
                        Op::Pause => engine.pause(),
                        Op::Resume => engine.resume(),
                        Op::Stop => engine.stop(),
                        Op::Restart => match engine.start(&p) {
                            Ok(effects) => effects,
                            Err(_) => Vec::new(),
                        },
                    };
                    check(&effects, &mut last_seen)?;
                }
            }
        }
    }
}
