//! Dead heap write elimination pass.

use crate::{
    analysis::callgraph::CallGraph,
    compiler::{DeadWriteElimination, EventLog, Pass, PassContext, TransformStats},
    ir::{Method, Program},
    Result,
};

/// Removes writes into method-local objects that nothing observes.
///
/// Runs after [`SideEffectSummaryPass`](super::SideEffectSummaryPass) so
/// that objects passed to calls which do not retain them stay local.
#[derive(Default)]
pub struct DeadWriteEliminationPass {
    call_graph: Option<CallGraph>,
}

impl DeadWriteEliminationPass {
    /// Creates a new dead write elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pass for DeadWriteEliminationPass {
    fn name(&self) -> &'static str {
        "dead-write-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes field and array writes into local objects that are never read"
    }

    fn initialize(&mut self, program: &Program, _ctx: &PassContext) -> Result<()> {
        self.call_graph = Some(CallGraph::build(program));
        Ok(())
    }

    fn run_on_method(&self, method: &mut Method, ctx: &PassContext) -> Result<TransformStats> {
        let Some(graph) = self.call_graph.as_ref() else {
            return Ok(TransformStats::default());
        };
        let events = EventLog::new();
        let stats = DeadWriteElimination::new(graph, &ctx.summaries)
            .with_events(&events)
            .run(method)?;
        ctx.events.merge(&events);
        Ok(stats)
    }

    fn finalize(&mut self, _ctx: &PassContext) -> Result<()> {
        self.call_graph = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::{EventKind, PassManager},
        ir::{assembler, MethodRef},
    };

    #[test]
    fn test_runs_with_published_summaries() {
        let mut program = assembler::program_from_str(
            r#"
            (class (public) "LFoo;"
              (method (public static) "LFoo;.sink:(LFoo;)V" ((return-void)))
              (method (public static) "LFoo;.f:()V"
                (
                  (new-instance "LFoo;")
                  (move-result-pseudo-object v0)
                  (const v1 1)
                  (iput v1 v0 "LFoo;.x:I")
                  (invoke-static (v0) "LFoo;.sink:(LFoo;)V")
                  (return-void)
                )))
            "#,
        )
        .unwrap();
        let ctx = PassContext::default();
        let mut manager = PassManager::new();
        manager.add(crate::compiler::SideEffectSummaryPass::new());
        manager.add(DeadWriteEliminationPass::new());

        // the argument of a call is observed even when the callee is pure
        let stats = manager.run(&mut program, &ctx).unwrap();
        assert_eq!(stats.dead_writes_eliminated, 0);
        assert!(!ctx.events.has(EventKind::DeadWriteRemoved));
        let method = program.method(&MethodRef::parse("LFoo;.f:()V").unwrap()).unwrap();
        assert!(assembler::to_s_expr(method.code.as_ref().unwrap())
            .to_string()
            .contains("iput"));
    }

    #[test]
    fn test_removes_unread_local_writes() {
        let mut program = assembler::program_from_str(
            r#"
            (class (public) "LFoo;"
              (method (public static) "LFoo;.f:()V"
                (
                  (new-instance "LFoo;")
                  (move-result-pseudo-object v0)
                  (const v1 1)
                  (iput v1 v0 "LFoo;.x:I")
                  (iput v1 v0 "LFoo;.y:I")
                  (return-void)
                )))
            "#,
        )
        .unwrap();
        let ctx = PassContext::default();
        let mut manager = PassManager::new();
        manager.add(DeadWriteEliminationPass::new());

        let stats = manager.run(&mut program, &ctx).unwrap();
        assert_eq!(stats.dead_writes_eliminated, 2);
        assert_eq!(ctx.events.count_kind(EventKind::DeadWriteRemoved), 2);
    }
}
