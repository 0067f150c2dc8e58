//! Transfer function trait and analysis direction.
//!
//! An analysis is a [`Transfer`] implementation: it names its abstract
//! domain, its direction, and how a single instruction (and optionally a
//! control-flow edge) transforms a state. The
//! [`MonotonicFixpointIterator`](super::MonotonicFixpointIterator) does the
//! rest.

use crate::{
    analysis::dataflow::lattice::JoinSemiLattice,
    ir::{Block, Edge, Instruction},
};

/// Direction of a dataflow analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Information flows from the entry block along edges.
    ///
    /// Examples: constant propagation, pointer analysis.
    Forward,

    /// Information flows from the exit blocks against edges.
    ///
    /// Examples: liveness.
    Backward,
}

/// The transfer functions of an analysis.
///
/// For forward analyses the "entry" state of a block is the state before its
/// first instruction and the "exit" state the state after its last one; for
/// backward analyses both are taken in analysis order, so the entry state is
/// the state after the last instruction.
///
/// # Example
///
/// ```rust
/// use optscope::analysis::dataflow::{
///     Direction, Environment, SignedConstantDomain, Transfer,
/// };
/// use optscope::ir::{Instruction, Reg};
///
/// /// Tracks registers loaded by `const`.
/// struct Consts;
///
/// impl Transfer for Consts {
///     type Domain = Environment<Reg, SignedConstantDomain>;
///     const DIRECTION: Direction = Direction::Forward;
///
///     fn analyze_instruction(&self, insn: &Instruction, state: &mut Self::Domain) {
///         if let Some(dest) = insn.dest {
///             let value = match insn.literal() {
///                 Some(v) if insn.srcs.is_empty() => SignedConstantDomain::Value(v),
///                 _ => SignedConstantDomain::Top,
///             };
///             state.set(dest, value);
///         }
///     }
/// }
/// ```
pub trait Transfer {
    /// The abstract state.
    type Domain: JoinSemiLattice;

    /// The direction of the analysis.
    const DIRECTION: Direction;

    /// Applies one instruction to `state`.
    fn analyze_instruction(&self, insn: &Instruction, state: &mut Self::Domain);

    /// Applies a whole block to `state`, in analysis order.
    ///
    /// Bottom states are left untouched: unreachable code produces no facts.
    fn analyze_node(&self, block: &Block, state: &mut Self::Domain) {
        if state.is_bottom() {
            return;
        }
        match Self::DIRECTION {
            Direction::Forward => {
                for insn in block.insns() {
                    self.analyze_instruction(insn, state);
                }
            }
            Direction::Backward => {
                for insn in block.insns().iter().rev() {
                    self.analyze_instruction(insn, state);
                }
            }
        }
    }

    /// Transforms the exit state of `block` as it flows along `edge`.
    ///
    /// `block` is the block the edge leaves in analysis order. Returning
    /// bottom marks the edge infeasible.
    fn analyze_edge(&self, _edge: &Edge, _block: &Block, exit: &Self::Domain) -> Self::Domain {
        exit.clone()
    }
}
