//! Engine event loop
//!
//! One thread owns every state mutation. Transport events, local commands
//! and the debounce clock all converge on a single `select!` loop, which
//! is what lets out-of-order and concurrent inputs reconcile without any
//! locking discipline beyond the shared state wrapper.
//!
//! Flow per iteration: drain one ready input (or time out at the nearest
//! deadline), then flush whatever became due: a scheduled context push or
//! a transcript fade.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::data::Dataset;
use crate::dispatch::{dispatch, DispatchOutcome};
use crate::error::{EngineError, Result};
use crate::message::{classify, AgentAction, Classified, ComparisonRequest, ControlEnvelope, CONTROL_TOPIC};
use crate::state::{ConnectionState, SharedViewState, ViewSnapshot};
use crate::summary::summarize;
use crate::sync::SyncScheduler;
use crate::transport::{Transport, TransportEvent};

/// Commands accepted by a running engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Apply a locally originated action (UI interactions use this path)
    Dispatch(AgentAction),
    /// Record that connecting failed before any session existed
    ConnectFailed(String),
    /// Stop the loop
    Shutdown,
}

/// Events emitted for observers
///
/// Events are advisory nudges; the shared view state is authoritative.
/// A slow observer loses events, never state.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Something in the view state changed
    StateChanged,
    /// The agent asked for a side-by-side comparison
    Comparison(ComparisonRequest),
    /// A context summary went out on the control topic
    ContextPushed,
    /// The loop has stopped
    Shutdown,
}

/// Handle for interacting with a running engine
#[derive(Debug)]
pub struct EngineHandle {
    command_tx: Sender<EngineCommand>,
    event_rx: Receiver<EngineEvent>,
    state: SharedViewState,
}

impl EngineHandle {
    /// Send an action through the same reducer transport actions use
    pub fn dispatch(&self, action: AgentAction) -> Result<()> {
        self.send(EngineCommand::Dispatch(action))
    }

    /// Record a connection-establishment failure for the UI
    pub fn connect_failed(&self, reason: impl Into<String>) -> Result<()> {
        self.send(EngineCommand::ConnectFailed(reason.into()))
    }

    /// Ask the loop to stop
    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineCommand::Shutdown)
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| EngineError::ChannelError("engine command channel closed".to_string()))
    }

    /// Non-blocking event poll
    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocking event poll with a timeout
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Shared view state; clones are cheap
    pub fn state(&self) -> SharedViewState {
        self.state.clone()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.state.snapshot()
    }

    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

/// Single-threaded owner of view state mutation
pub struct Engine {
    config: EngineConfig,
    dataset: Dataset,
    state: SharedViewState,
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    transport_rx: Receiver<TransportEvent>,
    transport: Box<dyn Transport>,
    scheduler: SyncScheduler,
    transcript_deadline: Option<Instant>,
}

impl Engine {
    /// Wire up an engine against a transport pair
    ///
    /// `transport` is the publish half, `transport_rx` the event stream
    /// from the session layer. Returns the engine and the handle used to
    /// drive it once started.
    pub fn new(
        config: EngineConfig,
        dataset: Dataset,
        transport: Box<dyn Transport>,
        transport_rx: Receiver<TransportEvent>,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = bounded(config.channel_buffer_size);
        let (event_tx, event_rx) = bounded(config.channel_buffer_size);
        let state = SharedViewState::new();
        let scheduler = SyncScheduler::new(config.sync_quiet);

        let handle = EngineHandle {
            command_tx,
            event_rx,
            state: state.clone(),
        };
        let engine = Self {
            config,
            dataset,
            state,
            command_rx,
            event_tx,
            transport_rx,
            transport,
            scheduler,
            transcript_deadline: None,
        };
        (engine, handle)
    }

    /// Spawn the loop on its own thread
    pub fn start(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(mut self) {
        info!("Engine loop starting");
        // Select on local clones so arm bodies can borrow self mutably
        let command_rx = self.command_rx.clone();
        let transport_rx = self.transport_rx.clone();
        loop {
            let idle = self.idle_timeout();
            select! {
                recv(command_rx) -> command => match command {
                    Ok(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => {
                        warn!("Command channel closed, stopping engine");
                        break;
                    }
                },
                recv(transport_rx) -> event => match event {
                    Ok(event) => self.handle_transport_event(event),
                    Err(_) => {
                        warn!("Transport event stream closed, stopping engine");
                        self.handle_disconnect(None);
                        break;
                    }
                },
                default(idle) => {}
            }
            self.flush_due_work();
        }
        self.emit(EngineEvent::Shutdown);
        info!("Engine loop stopped");
    }

    /// Sleep no longer than the nearest pending deadline
    fn idle_timeout(&self) -> Duration {
        let now = Instant::now();
        let mut idle = Duration::from_millis(250);
        if let Some(until) = self.scheduler.time_until_due(now) {
            idle = idle.min(until);
        }
        if let Some(deadline) = self.transcript_deadline {
            idle = idle.min(deadline.saturating_duration_since(now));
        }
        idle
    }

    /// Returns true when the loop should stop
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Dispatch(action) => {
                self.apply_action(action);
                false
            }
            EngineCommand::ConnectFailed(reason) => {
                let err = EngineError::ConnectionError(reason);
                warn!("{}", err);
                // The raw cause goes to the log; state carries what the
                // UI should show
                self.state.write().connection = ConnectionState::Failed(err.user_message());
                self.emit(EngineEvent::StateChanged);
                false
            }
            EngineCommand::Shutdown => {
                info!("Shutdown requested");
                true
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Transport connected");
                self.scheduler.set_connected(true);
                self.state.write().connection = ConnectionState::Connected;
                self.emit(EngineEvent::StateChanged);
                // The initial context push rides the same debounce as any
                // later change
                self.schedule_sync();
            }
            TransportEvent::Disconnected { reason } => self.handle_disconnect(reason),
            TransportEvent::ControlMessage { topic, data } => {
                self.handle_control_message(&topic, &data)
            }
            TransportEvent::AgentTranscription { text } => {
                self.state.write().transcript = Some(text);
                // Replacing the deadline also cancels the previous fade,
                // so a stale timer can never blank fresh speech
                self.transcript_deadline = Some(Instant::now() + self.config.transcript_fade);
                self.emit(EngineEvent::StateChanged);
            }
        }
    }

    fn handle_disconnect(&mut self, reason: Option<String>) {
        match &reason {
            Some(reason) => info!("Transport disconnected: {}", reason),
            None => info!("Transport disconnected"),
        }
        self.scheduler.set_connected(false);
        self.state.write().connection = ConnectionState::NotConnected;
        self.emit(EngineEvent::StateChanged);
    }

    fn handle_control_message(&mut self, topic: &str, data: &[u8]) {
        if topic != CONTROL_TOPIC {
            debug!("Ignoring message on unrelated topic: {}", topic);
            return;
        }
        let envelope = match ControlEnvelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed control message: {}", e);
                return;
            }
        };
        match classify(&envelope) {
            Classified::Action(action) => self.apply_action(action),
            Classified::Unrecognized(name) => info!("Ignoring unrecognized action: {}", name),
            Classified::Dropped(reason) => {
                warn!("Dropping {} action: {}", envelope.action, reason)
            }
        }
    }

    fn apply_action(&mut self, action: AgentAction) {
        let outcome = {
            let mut view = self.state.write();
            dispatch(&mut view, &self.dataset, action)
        };
        match outcome {
            DispatchOutcome::Applied => {
                self.emit(EngineEvent::StateChanged);
                self.schedule_sync();
            }
            DispatchOutcome::Compare(request) => self.emit(EngineEvent::Comparison(request)),
            DispatchOutcome::NoChange => {}
        }
    }

    /// Recompute the summary and hand it to the debounce machine
    fn schedule_sync(&mut self) {
        if !self.scheduler.is_connected() {
            return;
        }
        let summary = {
            let view = self.state.read();
            summarize(self.dataset.records(), &view.filter, &view.history)
        };
        match serde_json::to_string(&summary) {
            Ok(serialized) => self.scheduler.observe(serialized, Instant::now()),
            Err(e) => error!("Context summary serialization failed: {}", e),
        }
    }

    fn flush_due_work(&mut self) {
        let now = Instant::now();
        if let Some(payload) = self.scheduler.take_due(now) {
            self.push_context(payload);
        }
        if let Some(deadline) = self.transcript_deadline {
            if now >= deadline {
                self.transcript_deadline = None;
                self.state.write().transcript = None;
                debug!("Agent transcript faded");
                self.emit(EngineEvent::StateChanged);
            }
        }
    }

    fn push_context(&mut self, payload: String) {
        let bytes = ControlEnvelope::context_update_raw(&payload)
            .and_then(|envelope| envelope.encode());
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Context push dropped: {}", e);
                return;
            }
        };
        match self.transport.send_control(&bytes) {
            Ok(()) => {
                debug!("Context pushed, {} bytes", bytes.len());
                self.emit(EngineEvent::ContextPushed);
            }
            // Committed state stays; the next summary change schedules a
            // fresh attempt
            Err(e) => error!("Context push failed: {}", e),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            debug!("Engine event dropped, receiver full or gone");
        }
    }
}
