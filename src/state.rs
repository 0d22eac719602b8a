//! Owned view state and shared read access
//!
//! The engine thread is the only writer. Observers (UI, scenario runner,
//! tests) clone `SharedViewState` and take cheap read locks or full
//! snapshots.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::filter::FilterState;
use crate::history::HistoryStack;
use crate::summary::Insight;

/// Connection lifecycle of the real-time session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session established
    #[default]
    NotConnected,
    /// Data channel open, control traffic flowing
    Connected,
    /// Establishment failed; carries the user-facing reason
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::NotConnected => write!(f, "not connected"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Single source of truth for what the user is looking at
///
/// Everything the UI renders derives from this struct plus the immutable
/// dataset. All mutation goes through the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Active filter constraints
    pub filter: FilterState,
    /// Undo history, floor always present
    pub history: HistoryStack,
    /// Annotation for the most recently touched dimension
    pub insight: Option<Insight>,
    /// Real-time session status
    pub connection: ConnectionState,
    /// Live transcript of the agent speaking, faded out after a quiet delay
    pub transcript: Option<String>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Owned copy for use outside any lock
    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            filter: self.filter.clone(),
            history_depth: self.history.len(),
            can_undo: self.history.can_undo(),
            insight: self.insight.clone(),
            connection: self.connection.clone(),
            transcript: self.transcript.clone(),
        }
    }
}

/// Immutable copy of the view state at one instant
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub filter: FilterState,
    pub history_depth: usize,
    pub can_undo: bool,
    pub insight: Option<Insight>,
    pub connection: ConnectionState,
    pub transcript: Option<String>,
}

/// Thread-safe shared wrapper around the view state
#[derive(Debug, Clone, Default)]
pub struct SharedViewState {
    inner: Arc<RwLock<ViewState>>,
}

impl SharedViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read lock; hold briefly
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, ViewState> {
        self.inner.read()
    }

    /// Write lock; the engine thread is the only expected writer
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, ViewState> {
        self.inner.write()
    }

    /// Owned snapshot, safe to use without holding the lock
    pub fn snapshot(&self) -> ViewSnapshot {
        self.inner.read().snapshot()
    }

    pub fn filter(&self) -> FilterState {
        self.inner.read().filter.clone()
    }

    pub fn can_undo(&self) -> bool {
        self.inner.read().can_undo()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().connection.is_connected()
    }

    pub fn insight(&self) -> Option<Insight> {
        self.inner.read().insight.clone()
    }

    pub fn transcript(&self) -> Option<String> {
        self.inner.read().transcript.clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.inner.read().connection.clone()
    }
}
