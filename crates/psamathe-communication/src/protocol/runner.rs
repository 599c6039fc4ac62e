//! Job runner
//!
//! The single control loop that owns the protocol engine and the link
//! transport. All state transitions are serialized here: the loop merges
//! the control channel (start/pause/resume/stop from the surface) and
//! the inbound byte stream into one ordered sequence of engine steps,
//! tracks the acknowledgment deadline, and executes the engine's
//! effects. Progress events leave through the broadcast dispatcher and
//! never block the loop.

use crate::communication::Communicator;
use crate::protocol::engine::{EngineEffect, ProtocolConfig, ProtocolEngine};
use crate::protocol::frame::{Response, ResponseParser};
use parking_lot::RwLock;
use psamathe_core::{
    Error, EventDispatcher, JobEvent, JobState, Path, Result, TableGeometry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Protocol tuning knobs
    pub protocol: ProtocolConfig,
    /// How long the loop sleeps between spins
    pub poll_interval: Duration,
    /// Broadcast buffer for progress events
    pub event_buffer: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            poll_interval: Duration::from_millis(10),
            event_buffer: 100,
        }
    }
}

/// Control requests accepted by the loop
enum ControlRequest {
    Start(Path),
    Pause,
    Resume,
    Stop,
    Shutdown,
}

/// Handle to a running control loop
///
/// This is the control surface exposed to the GUI collaborator. All
/// methods enqueue a request; the loop applies it at its next step
/// boundary, so an in-flight frame is never cut short.
pub struct JobHandle {
    tx: mpsc::Sender<ControlRequest>,
    events: EventDispatcher,
    state: Arc<RwLock<JobState>>,
    task: JoinHandle<()>,
}

impl JobHandle {
    /// Begin a job over `path`
    pub async fn start(&self, path: Path) -> Result<()> {
        self.send(ControlRequest::Start(path)).await
    }

    /// Request a pause at the next step boundary
    pub async fn pause(&self) -> Result<()> {
        self.send(ControlRequest::Pause).await
    }

    /// Resume a paused job
    pub async fn resume(&self) -> Result<()> {
        self.send(ControlRequest::Resume).await
    }

    /// Abort the current job
    pub async fn stop(&self) -> Result<()> {
        self.send(ControlRequest::Stop).await
    }

    /// Stop the loop and release the transport
    pub async fn shutdown(self) {
        let _ = self.tx.send(ControlRequest::Shutdown).await;
        let _ = self.task.await;
    }

    /// Subscribe to progress/fault events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the engine state
    pub fn state(&self) -> JobState {
        *self.state.read()
    }

    async fn send(&self, request: ControlRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| Error::other("control loop is not running"))
    }
}

/// Spawn the control loop over an already-connected transport
pub fn spawn(
    transport: Box<dyn Communicator>,
    config: RunnerConfig,
    geometry: TableGeometry,
) -> JobHandle {
    let (tx, rx) = mpsc::channel(16);
    let events = EventDispatcher::new(config.event_buffer);
    let state = Arc::new(RwLock::new(JobState::Idle));

    let task = tokio::spawn(control_loop(
        transport,
        config,
        geometry,
        rx,
        events.clone(),
        state.clone(),
    ));

    JobHandle {
        tx,
        events,
        state,
        task,
    }
}

/// Deadline bookkeeping for the in-flight command
#[derive(Default)]
struct AckClock {
    /// When the current wait expires
    deadline: Option<Instant>,
    /// First transmission instant of the in-flight command
    first_sent: Option<Instant>,
    /// Which sequence number the clock is tracking
    seq: Option<u32>,
}

impl AckClock {
    fn on_transmit(&mut self, seq: u32, ack_timeout: Duration) {
        let now = Instant::now();
        if self.seq != Some(seq) {
            self.seq = Some(seq);
            self.first_sent = Some(now);
        }
        self.deadline = Some(now + ack_timeout);
    }

    fn clear(&mut self) {
        self.deadline = None;
        self.first_sent = None;
        self.seq = None;
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn elapsed(&self) -> Duration {
        self.first_sent.map(|t| t.elapsed()).unwrap_or_default()
    }
}

async fn control_loop(
    mut transport: Box<dyn Communicator>,
    config: RunnerConfig,
    geometry: TableGeometry,
    mut rx: mpsc::Receiver<ControlRequest>,
    events: EventDispatcher,
    state: Arc<RwLock<JobState>>,
) {
    let mut engine = ProtocolEngine::new(config.protocol.clone(), geometry);
    let mut parser = ResponseParser::new();
    let mut clock = AckClock::default();

    loop {
        // 1. CONTROL PHASE: drain requests from the surface
        let mut shutdown = false;
        loop {
            let request = match rx.try_recv() {
                Ok(request) => request,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Every handle is gone; nobody can drive us anymore.
                    shutdown = true;
                    break;
                }
            };
            let effects = match request {
                ControlRequest::Start(path) => match engine.start(&path) {
                    Ok(effects) => effects,
                    Err(err) => {
                        tracing::warn!(%err, "Start rejected");
                        Vec::new()
                    }
                },
                ControlRequest::Pause => engine.pause(),
                ControlRequest::Resume => engine.resume(),
                ControlRequest::Stop => engine.stop(),
                ControlRequest::Shutdown => {
                    shutdown = true;
                    break;
                }
            };
            apply_effects(
                effects,
                &mut engine,
                transport.as_mut(),
                &events,
                &mut clock,
                config.protocol.ack_timeout,
            );
        }
        if shutdown {
            let effects = engine.stop();
            apply_effects(
                effects,
                &mut engine,
                transport.as_mut(),
                &events,
                &mut clock,
                config.protocol.ack_timeout,
            );
            if let Err(err) = transport.disconnect() {
                tracing::warn!(%err, "Transport close failed");
            }
            *state.write() = engine.state();
            break;
        }

        // 2. READ PHASE: poll the link and feed complete lines through
        match transport.receive() {
            Ok(data) if !data.is_empty() => {
                for response in parser.push_bytes(&data) {
                    match response {
                        Response::Ack(ack) => {
                            let effects = engine.on_ack(ack);
                            apply_effects(
                                effects,
                                &mut engine,
                                transport.as_mut(),
                                &events,
                                &mut clock,
                                config.protocol.ack_timeout,
                            );
                        }
                        Response::Message(msg) => {
                            tracing::debug!(device = %msg, "Device message");
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                let effects = engine.on_link_error(&err.to_string());
                apply_effects(
                    effects,
                    &mut engine,
                    transport.as_mut(),
                    &events,
                    &mut clock,
                    config.protocol.ack_timeout,
                );
            }
        }

        // 3. TIMEOUT PHASE: check the ack deadline
        if engine.in_flight_seq().is_some() && clock.expired() {
            let effects = engine.on_timeout(clock.elapsed());
            apply_effects(
                effects,
                &mut engine,
                transport.as_mut(),
                &events,
                &mut clock,
                config.protocol.ack_timeout,
            );
        }

        *state.write() = engine.state();

        // Yield to let other tasks run and avoid hogging the CPU
        tokio::time::sleep(config.poll_interval).await;
    }
}

/// Execute a batch of engine effects
///
/// A transmit failure feeds back into the engine as a link error; the
/// resulting fault effects join the queue, so nothing is lost.
fn apply_effects(
    effects: Vec<EngineEffect>,
    engine: &mut ProtocolEngine,
    transport: &mut dyn Communicator,
    events: &EventDispatcher,
    clock: &mut AckClock,
    ack_timeout: Duration,
) {
    let mut queue = std::collections::VecDeque::from(effects);
    while let Some(effect) = queue.pop_front() {
        match effect {
            EngineEffect::Transmit(command) => {
                tracing::debug!(seq = command.seq, frame = %command.to_frame().trim_end(), "Transmit");
                clock.on_transmit(command.seq, ack_timeout);
                if let Err(err) = transport.send(&command.encode()) {
                    tracing::error!(%err, seq = command.seq, "Transmit failed");
                    queue.extend(engine.on_link_error(&err.to_string()));
                }
            }
            EngineEffect::Notify(event) => {
                tracing::debug!(%event, "Job event");
                // No subscribers is fine.
                let _ = events.publish(event);
            }
        }
    }
    if engine.in_flight_seq().is_none() {
        clock.clear();
    }
}
