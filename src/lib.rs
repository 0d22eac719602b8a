//! Voxboard: voice-driven exploration of tabular sales data
//!
//! The engine keeps one canonical `FilterState`, reconciles structured
//! actions arriving out of order from a real-time voice agent, tracks
//! undo history, and pushes a debounced context summary back so the
//! agent always reasons about what the user currently sees.
//!
//! The real-time session layer itself is an external collaborator; the
//! engine only consumes its events and publishes through the `Transport`
//! trait.

pub mod config;
pub mod data;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod filter;
pub mod history;
pub mod message;
pub mod scenario;
pub mod state;
pub mod summary;
pub mod sync;
pub mod transport;

pub use config::EngineConfig;
pub use data::{Dataset, DealStatus, Quarter, SalesRecord};
pub use dispatch::{dispatch, DispatchOutcome};
pub use engine::{Engine, EngineCommand, EngineEvent, EngineHandle};
pub use error::{EngineError, Result};
pub use filter::{Dimension, FilterPatch, FilterState};
pub use history::HistoryStack;
pub use message::{
    AgentAction, CompareKind, ComparisonRequest, ControlEnvelope, CONTROL_TOPIC,
};
pub use state::{ConnectionState, SharedViewState, ViewSnapshot, ViewState};
pub use summary::{derive_insight, summarize, ContextSummary, Insight};
pub use sync::SyncScheduler;
pub use transport::{
    CredentialProvider, MemoryTransport, MemoryTransportHandle, SessionCredentials,
    StaticCredentialProvider, Transport, TransportEvent,
};
