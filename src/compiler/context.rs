//! Shared state of a pipeline run.

use std::time::{Duration, Instant};

use crate::{
    analysis::summary::{seeded_summaries, SummaryMap},
    compiler::{EventLog, PassConfig},
};

/// State shared by every pass of one pipeline run.
///
/// Passes receive it by shared reference, also while processing methods in
/// parallel, so every field is either read-only or thread-safe.
pub struct PassContext {
    /// The bound configuration.
    pub config: PassConfig,

    /// Side-effect summaries, seeded with the bootstrap entries and filled by
    /// the summary pass.
    pub summaries: SummaryMap,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// When the run started.
    start_time: Instant,
}

impl PassContext {
    /// Creates a context with seeded summaries and an empty event log.
    #[must_use]
    pub fn new(config: PassConfig) -> Self {
        Self {
            config,
            summaries: seeded_summaries(),
            events: EventLog::new(),
            start_time: Instant::now(),
        }
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for PassContext {
    fn default() -> Self {
        Self::new(PassConfig::default())
    }
}
