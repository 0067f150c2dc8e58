//! Per-method summary construction.

use std::collections::BTreeMap;

use log::trace;

use crate::{
    analysis::{
        callgraph::{CallGraph, CallType},
        dataflow::{Effects, PointerSet},
        pointers::{self, param_sites, PointerState, PointerTransfer},
        summary::{callee_summary, Summary, SummaryMap},
    },
    ir::{InsnId, Instruction, Method, Reg},
};

/// Builds the summary of one method from the summaries of its callees.
///
/// Callees must be summarized first for the result to be precise; a callee
/// without a published summary counts as an unknown invoke.
pub struct SummaryBuilder<'a> {
    method: &'a Method,
    call_graph: &'a CallGraph,
    summaries: &'a SummaryMap,
}

impl<'a> SummaryBuilder<'a> {
    /// Creates a builder for `method`.
    #[must_use]
    pub fn new(method: &'a Method, call_graph: &'a CallGraph, summaries: &'a SummaryMap) -> Self {
        Self {
            method,
            call_graph,
            summaries,
        }
    }

    /// Scans the method body. Returns `None` for methods without code.
    #[must_use]
    pub fn build(&self) -> Option<Summary> {
        let code = self.method.code.as_ref()?;
        let caller = &self.method.reference;
        let transfer = PointerTransfer::with_summaries(caller, self.call_graph, self.summaries);
        let iterator = pointers::analyze(code, transfer);
        let params = param_sites(code);

        let mut summary = Summary::default();
        for block in code.blocks() {
            iterator.replay(block.id(), |insn, state| {
                self.analyze_instruction(insn, state, &params, &mut summary);
            });
        }
        if self.method.no_optimizations {
            summary.effects |= Effects::NO_OPTIMIZE;
        }
        Some(summary)
    }

    fn analyze_instruction(
        &self,
        insn: &Instruction,
        state: &PointerState,
        params: &BTreeMap<InsnId, u32>,
        summary: &mut Summary,
    ) {
        let op = insn.opcode;
        if op.is_throw() {
            summary.effects |= Effects::THROWS;
        } else if op.is_monitor() {
            summary.effects |= Effects::LOCKS;
        } else if op.is_sput() {
            summary.effects |= Effects::WRITE_MAY_ESCAPE;
        } else if let Some(base) = op.heap_write_base() {
            if let Some(reg) = insn.src(base) {
                classify_write(reg, state, params, summary);
            }
        } else if let Some(call_type) = CallType::from_opcode(op) {
            self.analyze_invoke(insn, call_type, state, params, summary);
        }
    }

    fn analyze_invoke(
        &self,
        insn: &Instruction,
        call_type: CallType,
        state: &PointerState,
        params: &BTreeMap<InsnId, u32>,
        summary: &mut Summary,
    ) {
        let callee = match call_type {
            CallType::Super | CallType::Interface => None,
            _ => callee_summary(self.call_graph, &self.method.reference, insn, self.summaries),
        };
        let Some(callee) = callee else {
            trace!("{}: unknown invoke {}", self.method.reference, insn);
            summary.effects |= Effects::UNKNOWN_INVOKE;
            return;
        };

        summary.effects |= callee.effects;
        for index in &callee.modified_params {
            let arg = usize::try_from(*index).ok().and_then(|i| insn.src(i));
            match arg {
                Some(reg) => classify_write(reg, state, params, summary),
                // The callee writes through a parameter the call does not pass
                None => summary.effects |= Effects::WRITE_MAY_ESCAPE,
            }
        }
    }
}

/// Records a write through the object(s) `reg` points to.
fn classify_write(
    reg: Reg,
    state: &PointerState,
    params: &BTreeMap<InsnId, u32>,
    summary: &mut Summary,
) {
    match state.get(reg) {
        PointerSet::Bottom => {}
        PointerSet::Top => summary.effects |= Effects::WRITE_MAY_ESCAPE,
        PointerSet::Sites(sites) => {
            for site in sites {
                if state.is_escaped(site) {
                    summary.effects |= Effects::WRITE_MAY_ESCAPE;
                } else if let Some(&index) = params.get(&site) {
                    summary.modified_params.insert(index);
                }
            }
        }
    }
}
