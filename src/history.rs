//! Undo history over filter states
//!
//! A push-only stack of complete `FilterState` snapshots. The floor is the
//! empty state the session started with, so undo can never fall off the
//! end. There is no redo.

use tracing::debug;

use crate::filter::FilterState;

/// Stack of filter snapshots, never empty
///
/// The initial empty state is stored apart from the pushed snapshots,
/// which keeps every accessor total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStack {
    floor: FilterState,
    pushed: Vec<FilterState>,
}

impl HistoryStack {
    /// A fresh stack holding only the empty filter state
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots, counting the initial empty state
    pub fn len(&self) -> usize {
        self.pushed.len() + 1
    }

    /// The stack always holds the floor; this mirrors the container API
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The state on top of the stack, i.e. the current one
    pub fn current(&self) -> &FilterState {
        self.pushed.last().unwrap_or(&self.floor)
    }

    /// Record a new state on top of the stack
    ///
    /// Every applied action pushes, even when the state is unchanged.
    /// Consecutive duplicates are kept so each undo maps to exactly one
    /// spoken command.
    pub fn push(&mut self, state: FilterState) {
        self.pushed.push(state);
        debug!("History depth now {}", self.len());
    }

    /// Whether undo would change anything
    pub fn can_undo(&self) -> bool {
        !self.pushed.is_empty()
    }

    /// Pop the current state and return the one beneath it
    ///
    /// At the floor this is a no-op and the initial empty state is
    /// returned unchanged.
    pub fn undo(&mut self) -> FilterState {
        if self.pushed.pop().is_none() {
            debug!("Undo at history floor, nothing to restore");
        }
        self.current().clone()
    }
}
