//! Intraprocedural pointer and escape analysis.
//!
//! Every object a method can name is identified by its *allocation site*:
//! the `new-instance` or `new-array` that creates it, or the
//! `load-param-object` that receives it. For each register the analysis
//! tracks the set of sites it may point to; alongside, it collects the sites
//! that have *escaped*, i.e. may be reachable from outside the method.
//!
//! A site escapes when a pointer to it is
//!
//! - stored into a static field, an instance field or an array element
//! - returned or thrown
//! - passed to a call whose callee may keep it (see
//!   [`Summary::retains_args`](crate::analysis::summary::Summary::retains_args))
//!
//! Loads from the heap produce pointers of unknown origin (top).

mod transfer;

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::dataflow::{
        AbstractDomain, Environment, JoinSemiLattice, MonotonicFixpointIterator, PointerSet,
    },
    ir::{ControlFlowGraph, InsnId, Opcode, Reg, RESULT_REGISTER},
};

pub use transfer::PointerTransfer;

/// Points-to sets of every register plus the escaped sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerState {
    registers: Environment<Reg, PointerSet>,
    escaped: BTreeSet<InsnId>,
}

impl PointerState {
    /// The state at method entry: nothing known, nothing escaped.
    #[must_use]
    pub fn entry() -> Self {
        Self {
            registers: Environment::top(),
            escaped: BTreeSet::new(),
        }
    }

    /// The sites `reg` may point to.
    #[must_use]
    pub fn get(&self, reg: Reg) -> PointerSet {
        self.registers.get(&reg)
    }

    /// The sites in the result register.
    #[must_use]
    pub fn result(&self) -> PointerSet {
        self.get(RESULT_REGISTER)
    }

    /// Returns `true` if `site` may be reachable from outside the method.
    #[must_use]
    pub fn is_escaped(&self, site: InsnId) -> bool {
        self.escaped.contains(&site)
    }

    /// Escaped sites.
    #[must_use]
    pub fn escaped(&self) -> &BTreeSet<InsnId> {
        &self.escaped
    }

    pub(crate) fn set(&mut self, reg: Reg, value: PointerSet) {
        self.registers.set(reg, value);
    }

    pub(crate) fn forget(&mut self, reg: Reg) {
        self.registers.forget(&reg);
    }

    /// Marks everything `reg` may point to as escaped.
    pub(crate) fn escape(&mut self, reg: Reg) {
        if let PointerSet::Sites(sites) = self.registers.get(&reg) {
            self.escaped.extend(sites);
        }
    }
}

impl JoinSemiLattice for PointerState {
    fn bottom() -> Self {
        Self {
            registers: Environment::bottom(),
            escaped: BTreeSet::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.registers.is_bottom()
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        !other.is_bottom()
            && self.registers.leq(&other.registers)
            && self.escaped.is_subset(&other.escaped)
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        Self {
            registers: self.registers.join(&other.registers),
            escaped: self.escaped.union(&other.escaped).copied().collect(),
        }
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return self.join(other);
        }
        Self {
            registers: self.registers.widen(&other.registers),
            escaped: self.escaped.union(&other.escaped).copied().collect(),
        }
    }
}

/// Parameter index of each `load-param-object` site.
///
/// Parameters are numbered by their position among all `load-param*`
/// instructions, so the receiver of an instance method is 0.
#[must_use]
pub fn param_sites(cfg: &ControlFlowGraph) -> BTreeMap<InsnId, u32> {
    cfg.param_instructions()
        .zip(0u32..)
        .filter(|(insn, _)| insn.opcode == Opcode::LoadParamObject)
        .map(|(insn, index)| (insn.id, index))
        .collect()
}

/// Every site that escapes anywhere in the analyzed method.
#[must_use]
pub fn escaped_anywhere(
    iterator: &MonotonicFixpointIterator<'_, PointerTransfer<'_>>,
) -> BTreeSet<InsnId> {
    iterator
        .cfg()
        .blocks()
        .iter()
        .flat_map(|b| iterator.exit_state_at(b.id()).escaped().iter().copied())
        .collect()
}

/// Runs the pointer analysis over `cfg`.
#[must_use]
pub fn analyze<'a>(
    cfg: &'a ControlFlowGraph,
    transfer: PointerTransfer<'a>,
) -> MonotonicFixpointIterator<'a, PointerTransfer<'a>> {
    let mut iterator = MonotonicFixpointIterator::new(cfg, transfer);
    iterator.run(PointerState::entry());
    iterator
}
