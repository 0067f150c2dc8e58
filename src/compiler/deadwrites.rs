//! Elimination of heap writes nobody can observe.
//!
//! A write into an object is dead when the object is allocated by the method
//! itself, never escapes it and is never read: no field or element load goes
//! through it and it is never passed to a call. Whether an argument escapes
//! a call is decided by the callee's side-effect summary.

use std::collections::BTreeSet;

use log::trace;

use crate::{
    analysis::{
        callgraph::CallGraph,
        dataflow::PointerSet,
        pointers::{self, escaped_anywhere, param_sites, PointerState, PointerTransfer},
        summary::SummaryMap,
    },
    compiler::{EditQueue, EventKind, EventLog, TransformStats},
    ir::{ControlFlowGraph, InsnId, Instruction, Method, MethodRef},
    Result,
};

/// Removes instance field, array element and array fill writes into local
/// objects that are never observed.
pub struct DeadWriteElimination<'a> {
    call_graph: &'a CallGraph,
    summaries: &'a SummaryMap,
    events: Option<&'a EventLog>,
}

impl<'a> DeadWriteElimination<'a> {
    /// Creates the eliminator. Calls to methods without a summary are
    /// assumed to keep their arguments.
    #[must_use]
    pub fn new(call_graph: &'a CallGraph, summaries: &'a SummaryMap) -> Self {
        Self {
            call_graph,
            summaries,
            events: None,
        }
    }

    /// Records every removed write into `log`.
    #[must_use]
    pub fn with_events(mut self, log: &'a EventLog) -> Self {
        self.events = Some(log);
        self
    }

    /// The writes of `code` that can be removed.
    #[must_use]
    pub fn dead_writes(&self, method: &MethodRef, code: &ControlFlowGraph) -> Vec<InsnId> {
        let transfer = PointerTransfer::with_summaries(method, self.call_graph, self.summaries);
        let iterator = pointers::analyze(code, transfer);
        let escaped = escaped_anywhere(&iterator);
        let params = param_sites(code);

        let mut observed: BTreeSet<InsnId> = BTreeSet::new();
        let mut writes: Vec<(InsnId, PointerSet)> = Vec::new();
        for block in code.blocks() {
            iterator.replay(block.id(), |insn, state| {
                collect(insn, state, &mut observed, &mut writes);
            });
        }

        writes
            .into_iter()
            .filter(|(_, target)| match target {
                PointerSet::Sites(sites) => {
                    !sites.is_empty()
                        && sites.iter().all(|site| {
                            !escaped.contains(site)
                                && !params.contains_key(site)
                                && !observed.contains(site)
                        })
                }
                _ => false,
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Removes the dead writes of `method`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCode`] if the result fails validation.
    pub fn run(&self, method: &mut Method) -> Result<TransformStats> {
        let Some(code) = method.code.as_mut() else {
            return Ok(TransformStats::default());
        };
        let dead = self.dead_writes(&method.reference, code);
        if dead.is_empty() {
            return Ok(TransformStats::default());
        }

        let mut queue = EditQueue::new();
        for &id in &dead {
            trace!("{}: removing dead write {}", method.reference, id);
            if let Some(log) = self.events {
                log.record(EventKind::DeadWriteRemoved)
                    .at(method.reference.clone(), id);
            }
            queue.delete(id);
        }
        queue.commit(code)?;
        Ok(TransformStats {
            dead_writes_eliminated: dead.len(),
            ..TransformStats::default()
        })
    }
}

fn collect(
    insn: &Instruction,
    state: &PointerState,
    observed: &mut BTreeSet<InsnId>,
    writes: &mut Vec<(InsnId, PointerSet)>,
) {
    let op = insn.opcode;
    let mut observe = |reg| {
        if let PointerSet::Sites(sites) = state.get(reg) {
            observed.extend(sites);
        }
    };

    if op.is_iget() || op.is_aget() {
        if let Some(base) = insn.src(0) {
            observe(base);
        }
    } else if op.is_invoke() {
        for &arg in &insn.srcs {
            observe(arg);
        }
    } else if let Some(base) = op.heap_write_base().and_then(|i| insn.src(i)) {
        writes.push((insn.id, state.get(base)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{dataflow::Effects, summary::Summary},
        ir::{
            assembler::{program_from_str, to_s_expr},
            Program,
        },
    };

    const SOURCE: &str = r#"
        (class (public) "LFoo;"
          (method (public static) "LFoo;.local:()V"
            (
              (new-instance "LFoo;")
              (move-result-pseudo-object v0)
              (const v1 1)
              (iput v1 v0 "LFoo;.x:I")
              (return-void)
            ))
          (method (public static) "LFoo;.read:()I"
            (
              (new-instance "LFoo;")
              (move-result-pseudo-object v0)
              (const v1 1)
              (iput v1 v0 "LFoo;.x:I")
              (iget v0 "LFoo;.x:I")
              (move-result-pseudo v2)
              (return v2)
            ))
          (method (public static) "LFoo;.param:(LFoo;)V"
            (
              (load-param-object v0)
              (const v1 1)
              (iput v1 v0 "LFoo;.x:I")
              (return-void)
            ))
          (method (public static) "LFoo;.passed:()V"
            (
              (new-instance "LFoo;")
              (move-result-pseudo-object v0)
              (const v1 1)
              (iput v1 v0 "LFoo;.x:I")
              (invoke-static (v0) "LFoo;.param:(LFoo;)V")
              (return-void)
            ))
          (method (public static) "LFoo;.array:()V"
            (
              (const v0 2)
              (new-array v0 "[I")
              (move-result-pseudo-object v1)
              (const v2 0)
              (aput v2 v1 v2)
              (return-void)
            )))
    "#;

    fn run(program: &mut Program, name: &str) -> usize {
        let graph = CallGraph::build(program);
        let summaries = SummaryMap::new();
        summaries.insert(
            MethodRef::parse("LFoo;.param:(LFoo;)V").unwrap(),
            Summary::new(Effects::empty(), [0]),
        );
        let method = program.method_mut(&MethodRef::parse(name).unwrap()).unwrap();
        DeadWriteElimination::new(&graph, &summaries)
            .run(method)
            .unwrap()
            .dead_writes_eliminated
    }

    fn code(program: &Program, name: &str) -> String {
        let method = program.method(&MethodRef::parse(name).unwrap()).unwrap();
        to_s_expr(method.code.as_ref().unwrap()).to_string()
    }

    #[test]
    fn test_local_write_is_removed() {
        let mut program = program_from_str(SOURCE).unwrap();
        assert_eq!(run(&mut program, "LFoo;.local:()V"), 1);
        assert!(!code(&program, "LFoo;.local:()V").contains("iput"));

        assert_eq!(run(&mut program, "LFoo;.array:()V"), 1);
        assert!(!code(&program, "LFoo;.array:()V").contains("aput"));
    }

    #[test]
    fn test_observable_writes_are_kept() {
        let mut program = program_from_str(SOURCE).unwrap();
        for name in ["LFoo;.read:()I", "LFoo;.param:(LFoo;)V", "LFoo;.passed:()V"] {
            let before = code(&program, name);
            assert_eq!(run(&mut program, name), 0, "{name}");
            assert_eq!(code(&program, name), before, "{name}");
        }
    }
}
