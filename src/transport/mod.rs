//! Real-time transport boundary
//!
//! The engine never talks to a concrete real-time stack. It consumes
//! `TransportEvent`s from a channel and publishes through the `Transport`
//! trait, so the whole session layer (WebRTC, websockets, whatever) stays
//! an external collaborator. `MemoryTransport` implements the boundary
//! in-process for tests, scenarios and the demo binary.

pub mod credentials;
pub mod memory;

pub use credentials::{CredentialProvider, SessionCredentials, StaticCredentialProvider};
pub use memory::{MemoryTransport, MemoryTransportHandle};

use crate::error::Result;

/// Events surfaced by the session layer
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Data channel established; control traffic may flow
    Connected,
    /// Session lost or closed; `reason` is user-facing when present
    Disconnected { reason: Option<String> },
    /// Raw bytes received on a named data topic
    ControlMessage { topic: String, data: Vec<u8> },
    /// Live transcription of the agent speaking
    AgentTranscription { text: String },
}

/// Capability interface for publishing control messages
///
/// Implementations must deliver reliably and in order on the control
/// topic. Send failures surface as transport errors; the engine logs
/// them and lets the next summary change retry naturally.
pub trait Transport: Send {
    fn send_control(&self, data: &[u8]) -> Result<()>;
}
