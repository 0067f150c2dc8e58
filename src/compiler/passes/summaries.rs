//! Side-effect summary pass.
//!
//! Computes the side-effect summary of every method and publishes it into
//! [`PassContext::summaries`], where later passes look up callees. With a
//! cache configured, summaries of an earlier run are loaded first and only
//! the missing ones are computed; the complete set is written back.

use std::io;

use log::warn;

use crate::{
    analysis::{
        callgraph::CallGraph,
        summary::{cache, SummaryDriver},
    },
    compiler::{EventKind, Pass, PassContext, TransformStats},
    ir::Program,
    Error, Result,
};

/// Publishes side-effect summaries for all methods.
#[derive(Debug, Default)]
pub struct SideEffectSummaryPass;

impl SideEffectSummaryPass {
    /// Creates a new summary pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn load_cache(ctx: &PassContext) -> Result<()> {
        let Some(path) = ctx.config.summary_cache.as_deref() else {
            return Ok(());
        };
        match cache::load(path) {
            Ok(cached) => {
                for (method, summary) in cached {
                    ctx.summaries.entry(method).or_insert(summary);
                }
                Ok(())
            }
            Err(Error::FileError(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e @ (Error::CorruptSummaryCache(_) | Error::FileError(_))) => {
                warn!("Rebuilding summary cache {}: {}", path.display(), e);
                ctx.events
                    .record(EventKind::CacheRebuilt)
                    .message(format!("{}: {e}", path.display()));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Pass for SideEffectSummaryPass {
    fn name(&self) -> &'static str {
        "side-effect-summaries"
    }

    fn description(&self) -> &'static str {
        "Computes which methods have side effects and which parameters they modify"
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run_global(&self, program: &mut Program, ctx: &PassContext) -> Result<TransformStats> {
        Self::load_cache(ctx)?;

        let program: &Program = program;
        let graph = CallGraph::build(program);
        let published = SummaryDriver::new(program, &graph, &ctx.summaries).run();
        ctx.events
            .record(EventKind::SummaryComputed)
            .message(format!("{published} summaries computed"));

        if let Some(path) = ctx.config.summary_cache.as_deref() {
            cache::save(path, &ctx.summaries)?;
        }
        Ok(TransformStats::default())
    }
}
