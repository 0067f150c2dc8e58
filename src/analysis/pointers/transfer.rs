//! Pointer analysis transfer functions.

use log::trace;

use crate::{
    analysis::{
        callgraph::CallGraph,
        dataflow::{Direction, PointerSet, Transfer},
        pointers::PointerState,
        summary::{callee_summary, SummaryMap},
    },
    ir::{Instruction, MethodRef, Opcode, RESULT_REGISTER},
};

/// Callee information used to decide whether invoke arguments escape.
#[derive(Debug, Clone, Copy)]
struct InvokeContext<'a> {
    caller: &'a MethodRef,
    call_graph: &'a CallGraph,
    summaries: &'a SummaryMap,
}

/// Forward transfer for the pointer analysis.
///
/// Without summaries every pointer passed to a call escapes. With them, a
/// call to a method whose summary shows it cannot keep its arguments leaves
/// them local.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerTransfer<'a> {
    invokes: Option<InvokeContext<'a>>,
}

impl<'a> PointerTransfer<'a> {
    /// A transfer that treats every call as unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transfer for the body of `caller` that consults the published
    /// summaries of its callees.
    #[must_use]
    pub fn with_summaries(
        caller: &'a MethodRef,
        call_graph: &'a CallGraph,
        summaries: &'a SummaryMap,
    ) -> Self {
        Self {
            invokes: Some(InvokeContext {
                caller,
                call_graph,
                summaries,
            }),
        }
    }

    fn retains_args(&self, insn: &Instruction) -> bool {
        let Some(ctx) = self.invokes else {
            return false;
        };
        let retained = callee_summary(ctx.call_graph, ctx.caller, insn, ctx.summaries)
            .is_some_and(|summary| summary.retains_args(insn.srcs.len()));
        if !retained {
            trace!("{}: arguments of {} escape", ctx.caller, insn);
        }
        retained
    }
}

impl Transfer for PointerTransfer<'_> {
    type Domain = PointerState;
    const DIRECTION: Direction = Direction::Forward;

    fn analyze_instruction(&self, insn: &Instruction, state: &mut PointerState) {
        let op = insn.opcode;
        let src = |i: usize| insn.src(i);

        if op.is_sput() || op.is_iput() || op.is_aput() {
            // The stored value is the first source
            if let Some(value) = src(0) {
                state.escape(value);
            }
        } else if op.is_return() || op.is_throw() {
            if let Some(value) = src(0) {
                state.escape(value);
            }
        } else if op.is_invoke() {
            if !self.retains_args(insn) {
                for &arg in &insn.srcs {
                    state.escape(arg);
                }
            }
            state.forget(RESULT_REGISTER);
        }

        let value = match op {
            Opcode::LoadParamObject => PointerSet::site(insn.id),
            Opcode::NewInstance | Opcode::NewArray => {
                state.set(RESULT_REGISTER, PointerSet::site(insn.id));
                return;
            }
            Opcode::CheckCast => {
                let cast = src(0).map_or(PointerSet::Top, |r| state.get(r));
                state.set(RESULT_REGISTER, cast);
                return;
            }
            Opcode::Const | Opcode::ConstWide => PointerSet::empty(),
            _ if op.is_move() => src(0).map_or(PointerSet::Top, |r| state.get(r)),
            _ if op.is_move_result() || op.is_move_result_pseudo() => state.result(),
            _ if op.has_move_result_pseudo() => {
                state.forget(RESULT_REGISTER);
                return;
            }
            _ => PointerSet::Top,
        };

        if let Some(dest) = insn.dest {
            state.set(dest, value);
            if op.dest_is_wide() {
                state.forget(dest.saturating_add(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{dataflow::Effects, pointers::analyze, summary::Summary},
        ir::assembler::program_from_str,
    };

    #[test]
    fn test_summaries_keep_arguments_local() {
        let program = program_from_str(
            r#"
            (class (public) "LFoo;"
              (method (public static) "LFoo;.run:()V"
                (
                  (new-instance "LFoo;")
                  (move-result-pseudo-object v0)
                  (invoke-static (v0) "LFoo;.touch:(LFoo;)V")
                  (new-instance "LFoo;")
                  (move-result-pseudo-object v1)
                  (invoke-static (v1) "LFoo;.leak:(LFoo;)V")
                  (return-void)
                ))
              (method (public static) "LFoo;.touch:(LFoo;)V" ((return-void)))
              (method (public static) "LFoo;.leak:(LFoo;)V" ((return-void))))
            "#,
        )
        .unwrap();
        let graph = CallGraph::build(&program);
        let run = MethodRef::parse("LFoo;.run:()V").unwrap();
        let summaries = SummaryMap::new();
        summaries.insert(
            MethodRef::parse("LFoo;.touch:(LFoo;)V").unwrap(),
            Summary::new(Effects::empty(), [0]),
        );
        summaries.insert(
            MethodRef::parse("LFoo;.leak:(LFoo;)V").unwrap(),
            Summary::new(Effects::WRITE_MAY_ESCAPE, []),
        );

        let code = program.method(&run).unwrap().code.as_ref().unwrap();
        let iterator = analyze(code, PointerTransfer::with_summaries(&run, &graph, &summaries));
        let state = iterator.exit_state_at(code.entry());

        let sites: Vec<_> = code
            .instructions()
            .filter(|i| i.opcode == Opcode::NewInstance)
            .map(|i| i.id)
            .collect();
        assert!(!state.is_escaped(sites[0]));
        assert!(state.is_escaped(sites[1]));

        // Without summaries both escape
        let iterator = analyze(code, PointerTransfer::new());
        let state = iterator.exit_state_at(code.entry());
        assert!(sites.iter().all(|&s| state.is_escaped(s)));
    }
}
