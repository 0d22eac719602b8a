//! Engine configuration

use std::time::Duration;

/// Tunables for the engine loop
///
/// Defaults match production behavior; tests shrink the intervals so
/// debounce edges can be exercised quickly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet interval the context push debounce waits out
    pub sync_quiet: Duration,
    /// How long an agent transcript stays visible without new speech
    pub transcript_fade: Duration,
    /// Bound for the command and event channels
    pub channel_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_quiet: Duration::from_millis(500),
            transcript_fade: Duration::from_secs(4),
            channel_buffer_size: 100,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sync_quiet(mut self, quiet: Duration) -> Self {
        self.sync_quiet = quiet;
        self
    }

    pub fn with_transcript_fade(mut self, fade: Duration) -> Self {
        self.transcript_fade = fade;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}
