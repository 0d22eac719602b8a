//! In-memory transport
//!
//! Drives the engine without any network. The handle side plays the role
//! of the session layer and the remote agent: it raises connection
//! events, delivers topic bytes and records everything the engine
//! publishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::warn;

use super::{Transport, TransportEvent};
use crate::error::{EngineError, Result};
use crate::message::{ControlEnvelope, CONTROL_TOPIC};

/// Engine-side half: publishes into a shared outbox
#[derive(Debug)]
pub struct MemoryTransport {
    outbox: Arc<Mutex<Vec<Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

/// Test-side half: injects events, inspects published messages
#[derive(Debug, Clone)]
pub struct MemoryTransportHandle {
    event_tx: Sender<TransportEvent>,
    outbox: Arc<Mutex<Vec<Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Create the paired halves plus the event receiver the engine consumes
    pub fn new(buffer: usize) -> (Self, MemoryTransportHandle, Receiver<TransportEvent>) {
        let (event_tx, event_rx) = bounded(buffer);
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let failing = Arc::new(AtomicBool::new(false));
        let transport = Self {
            outbox: Arc::clone(&outbox),
            failing: Arc::clone(&failing),
        };
        let handle = MemoryTransportHandle {
            event_tx,
            outbox,
            failing,
        };
        (transport, handle, event_rx)
    }
}

impl Transport for MemoryTransport {
    fn send_control(&self, data: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::TransportError(
                "simulated send failure".to_string(),
            ));
        }
        self.outbox.lock().push(data.to_vec());
        Ok(())
    }
}

impl MemoryTransportHandle {
    /// Raise the connected event
    pub fn connect(&self) {
        self.send(TransportEvent::Connected);
    }

    /// Raise the disconnected event
    pub fn disconnect(&self, reason: Option<String>) {
        self.send(TransportEvent::Disconnected { reason });
    }

    /// Deliver raw bytes on an arbitrary topic
    pub fn deliver(&self, topic: impl Into<String>, data: Vec<u8>) {
        self.send(TransportEvent::ControlMessage {
            topic: topic.into(),
            data,
        });
    }

    /// Encode an envelope and deliver it on the control topic
    pub fn deliver_action(&self, envelope: &ControlEnvelope) -> Result<()> {
        let bytes = envelope.encode()?;
        self.deliver(CONTROL_TOPIC, bytes);
        Ok(())
    }

    /// Deliver an agent transcription event
    pub fn transcribe(&self, text: impl Into<String>) {
        self.send(TransportEvent::AgentTranscription { text: text.into() });
    }

    /// Everything the engine has published, oldest first
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.outbox.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.outbox.lock().len()
    }

    /// Decode the most recently published envelope, if any
    pub fn last_sent_envelope(&self) -> Option<ControlEnvelope> {
        let outbox = self.outbox.lock();
        let bytes = outbox.last()?;
        ControlEnvelope::decode(bytes).ok()
    }

    /// Make subsequent publishes fail until turned off again
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn send(&self, event: TransportEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("Transport event dropped, engine receiver is gone");
        }
    }
}
