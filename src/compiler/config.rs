//! Configuration for the pass pipeline.
//!
//! The configuration is bound before any pass runs and is read-only while
//! they do; the analyses themselves never see it.

use std::path::PathBuf;

use crate::{analysis::dataflow::DEFAULT_WIDENING_THRESHOLD, compiler::Config};

/// Configuration for the [`PassManager`](crate::compiler::PassManager).
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Run the side-effect summary pass (default: true).
    pub enable_summaries: bool,

    /// Run the static initializer inlining pass (default: true).
    pub enable_final_inline: bool,

    /// Run the constant propagation pass (default: true).
    pub enable_constant_propagation: bool,

    /// Run the dead heap write elimination pass (default: true).
    pub enable_dead_writes: bool,

    /// Replace moves of known values by constant loads (default: true).
    pub replace_moves_with_consts: bool,

    /// Where side-effect summaries are cached between runs.
    ///
    /// A missing or corrupt cache is rebuilt.
    pub summary_cache: Option<PathBuf>,

    /// Joins into a block before the fixpoint iterator starts widening.
    pub widening_threshold: usize,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            enable_summaries: true,
            enable_final_inline: true,
            enable_constant_propagation: true,
            enable_dead_writes: true,
            replace_moves_with_consts: true,
            summary_cache: None,
            widening_threshold: DEFAULT_WIDENING_THRESHOLD,
        }
    }
}

impl PassConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with every pass disabled.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enable_summaries: false,
            enable_final_inline: false,
            enable_constant_propagation: false,
            enable_dead_writes: false,
            ..Self::default()
        }
    }

    /// Returns true if any pass is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.enable_summaries
            || self.enable_final_inline
            || self.enable_constant_propagation
            || self.enable_dead_writes
    }

    /// Caches summaries at `path`.
    #[must_use]
    pub fn with_summary_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_cache = Some(path.into());
        self
    }

    /// Sets whether moves are replaced by constant loads.
    #[must_use]
    pub fn with_replace_moves_with_consts(mut self, enabled: bool) -> Self {
        self.replace_moves_with_consts = enabled;
        self
    }

    /// Sets the widening threshold of every fixpoint iteration.
    #[must_use]
    pub fn with_widening_threshold(mut self, threshold: usize) -> Self {
        self.widening_threshold = threshold;
        self
    }

    /// The transform configuration for methods outside any class
    /// initializer.
    #[must_use]
    pub fn transform_config(&self) -> Config {
        Config::default().with_replace_moves_with_consts(self.replace_moves_with_consts)
    }
}
