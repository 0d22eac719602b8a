//! Debounced, deduplicated context push scheduling
//!
//! Pure state machine, no threads or timers of its own. The engine loop
//! feeds it summary serializations and clock readings; it decides when a
//! push is actually due. Keeping it synchronous makes the debounce edge
//! cases directly testable.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Trailing-edge debounce over context summaries
///
/// One pending payload at most. Every observed change restarts the quiet
/// interval and replaces the payload, so a burst of changes collapses to
/// a single push of the final state. A summary identical to the last one
/// pushed is skipped entirely.
#[derive(Debug)]
pub struct SyncScheduler {
    quiet: Duration,
    connected: bool,
    /// Serialization of the last successfully handed-off payload
    baseline: Option<String>,
    /// Payload waiting out the quiet interval, with its due time
    pending: Option<(String, Instant)>,
}

impl SyncScheduler {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            connected: false,
            baseline: None,
            pending: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Track connection state
    ///
    /// Disconnecting abandons any pending push and forgets the baseline,
    /// so the first push after a reconnect is never skipped as a
    /// duplicate.
    pub fn set_connected(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        if !connected {
            if self.pending.take().is_some() {
                debug!("Pending context push abandoned on disconnect");
            }
            self.baseline = None;
        }
    }

    /// Feed a freshly serialized summary into the machine
    ///
    /// Ignored while disconnected. Skipped when identical to the last
    /// pushed serialization. Otherwise the payload replaces any pending
    /// one and the quiet interval restarts from `now`.
    pub fn observe(&mut self, serialized: String, now: Instant) {
        if !self.connected {
            trace!("Summary observed while disconnected, ignoring");
            return;
        }
        if self.baseline.as_deref() == Some(serialized.as_str()) {
            trace!("Summary unchanged since last push, skipping");
            return;
        }
        let due = now + self.quiet;
        self.pending = Some((serialized, due));
        trace!("Context push scheduled in {:?}", self.quiet);
    }

    /// When the pending push becomes due, if one exists
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    /// Time left until the pending push, zero if already due
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.deadline().map(|due| due.saturating_duration_since(now))
    }

    /// Hand over the payload if its quiet interval has elapsed
    ///
    /// The payload becomes the new baseline on handoff. The caller owns
    /// actually transmitting it; a failed transmit is not retried here,
    /// the next summary change schedules a fresh push.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        let (_, due) = self.pending.as_ref()?;
        if now < *due {
            return None;
        }
        let (payload, _) = self.pending.take()?;
        self.baseline = Some(payload.clone());
        debug!("Context push due, {} bytes", payload.len());
        Some(payload)
    }
}
