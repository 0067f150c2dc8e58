//! Pass manager running the configured passes in order.
//!
//! Global passes see the whole program. Per-method passes are run over all
//! methods in parallel; their stats are reduced with `+`, so the totals do
//! not depend on scheduling.

use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;

use crate::{
    compiler::{
        passes::{
            ConstantPropagationPass, DeadWriteEliminationPass, FinalInlinePass,
            SideEffectSummaryPass,
        },
        EventKind, Pass, PassConfig, PassContext, TransformStats,
    },
    ir::Program,
    Result,
};

/// What one pass did and how long it took.
#[derive(Debug, Clone)]
pub struct PassMetrics {
    /// The pass name.
    pub name: &'static str,
    /// Rewrites the pass committed.
    pub stats: TransformStats,
    /// Wall time of the pass, including initialization.
    pub elapsed: Duration,
}

/// Runs passes over a program, one after another.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    metrics: Vec<PassMetrics>,
}

impl PassManager {
    /// Creates a manager without passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with the passes enabled in `config`, in pipeline
    /// order: summaries, static initializer inlining, constant propagation,
    /// dead writes.
    #[must_use]
    pub fn from_config(config: &PassConfig) -> Self {
        let mut manager = Self::new();
        if config.enable_summaries {
            manager.add(SideEffectSummaryPass::new());
        }
        if config.enable_final_inline {
            manager.add(FinalInlinePass::new());
        }
        if config.enable_constant_propagation {
            manager.add(ConstantPropagationPass::new());
        }
        if config.enable_dead_writes {
            manager.add(DeadWriteEliminationPass::new());
        }
        manager
    }

    /// Appends a pass.
    pub fn add(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Names of the registered passes, in order.
    #[must_use]
    pub fn passes(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Metrics of the passes run so far.
    #[must_use]
    pub fn metrics(&self) -> &[PassMetrics] {
        &self.metrics
    }

    /// Runs every pass once. Returns the combined stats.
    ///
    /// # Errors
    ///
    /// Stops at the first failing pass. Per-method failures are reported as
    /// [`crate::Error::MethodFailed`].
    pub fn run(&mut self, program: &mut Program, ctx: &PassContext) -> Result<TransformStats> {
        let mut total = TransformStats::default();
        for pass in &mut self.passes {
            let started = Instant::now();
            let name = pass.name();
            debug!("Running {}: {}", name, pass.description());
            ctx.events.record(EventKind::PassStarted).pass(name);

            pass.initialize(program, ctx)?;
            let stats = if pass.is_global() {
                pass.run_global(program, ctx)?
            } else {
                let pass: &dyn Pass = &**pass;
                program
                    .par_methods_mut()
                    .filter(|method| pass.should_run(method, ctx))
                    .map(|method| {
                        pass.run_on_method(method, ctx).map_err(|e| {
                            ctx.events
                                .record(EventKind::Error)
                                .method(method.reference.clone())
                                .pass(name)
                                .message(e.to_string());
                            e.in_method(&method.reference)
                        })
                    })
                    .try_reduce(TransformStats::default, |a, b| Ok(a + b))?
            };
            pass.finalize(ctx)?;

            let elapsed = started.elapsed();
            info!(
                "{}: {} branches removed, {} constants materialized, {} dead writes eliminated ({:?})",
                name,
                stats.branches_removed,
                stats.constants_materialized,
                stats.dead_writes_eliminated,
                elapsed
            );
            ctx.events
                .record(EventKind::PassCompleted)
                .pass(name)
                .message(format!("{elapsed:?}"));
            self.metrics.push(PassMetrics {
                name,
                stats,
                elapsed,
            });
            total += stats;
        }
        Ok(total)
    }
}
