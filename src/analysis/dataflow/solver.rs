//! Worklist-based monotonic fixpoint iterator.
//!
//! # Algorithm
//!
//! 1. Every block starts at bottom; the start blocks (the entry block for
//!    forward analyses, the exit blocks for backward ones) are seeded with the
//!    initial state
//! 2. A block's entry state is the join of the seed (for start blocks) and of
//!    every incoming edge's transferred exit state
//! 3. The exit state is the block's transfer applied to the entry state
//! 4. When a block's exit changes, the blocks it flows into are re-enqueued
//! 5. After a block has been joined `widening_threshold` times, further
//!    updates widen instead of join
//!
//! Blocks whose entry state stays bottom are unreachable; they produce no
//! facts and are never removed here.
//!
//! The result does not depend on the order blocks are visited in; reverse
//! postorder is used because it converges fastest on reducible graphs.

use std::collections::VecDeque;

use log::trace;

use crate::{
    analysis::dataflow::{
        framework::{Direction, Transfer},
        lattice::JoinSemiLattice,
    },
    ir::{Block, BlockId, ControlFlowGraph, Instruction},
};

/// Number of plain joins into a block before widening starts.
pub const DEFAULT_WIDENING_THRESHOLD: usize = 8;

/// Computes a stable abstract state for every block of a control-flow graph.
///
/// # Usage
///
/// ```rust
/// use optscope::prelude::*;
///
/// let code = assembler::code_from_str(r#"(
///     (const v0 3)
///     (add-int/lit8 v1 v0 4)
///     (return v1)
/// )"#)?;
///
/// let mut iterator = MonotonicFixpointIterator::new(&code, ConstantTransfer::default());
/// iterator.run(ConstantEnvironment::top());
///
/// let exit = iterator.exit_state_at(code.entry());
/// assert_eq!(exit.get(&Location::Register(1)).as_int(), Some(7));
/// # Ok::<(), optscope::Error>(())
/// ```
pub struct MonotonicFixpointIterator<'a, T: Transfer> {
    /// The graph being analyzed.
    cfg: &'a ControlFlowGraph,
    /// The analysis.
    transfer: T,
    /// State flowing into each block, in analysis order.
    entry_states: Vec<T::Domain>,
    /// State flowing out of each block, in analysis order.
    exit_states: Vec<T::Domain>,
    /// Joins per block before widening.
    widening_threshold: usize,
    /// Number of block visits performed.
    iterations: usize,
}

impl<'a, T: Transfer> MonotonicFixpointIterator<'a, T> {
    /// Creates an iterator; all states are bottom until [`Self::run`].
    #[must_use]
    pub fn new(cfg: &'a ControlFlowGraph, transfer: T) -> Self {
        let count = cfg.block_count();
        Self {
            cfg,
            transfer,
            entry_states: vec![T::Domain::bottom(); count],
            exit_states: vec![T::Domain::bottom(); count],
            widening_threshold: DEFAULT_WIDENING_THRESHOLD,
            iterations: 0,
        }
    }

    /// Sets how many plain joins a block receives before widening.
    #[must_use]
    pub fn with_widening_threshold(mut self, threshold: usize) -> Self {
        self.widening_threshold = threshold;
        self
    }

    /// Runs the analysis to a fixpoint from `init`.
    ///
    /// Running again restarts from scratch.
    pub fn run(&mut self, init: T::Domain) {
        let count = self.cfg.block_count();
        self.entry_states = vec![T::Domain::bottom(); count];
        self.exit_states = vec![T::Domain::bottom(); count];
        self.iterations = 0;
        if count == 0 {
            return;
        }

        let starts: Vec<BlockId> = match T::DIRECTION {
            Direction::Forward => vec![self.cfg.entry()],
            Direction::Backward => self.cfg.exit_blocks(),
        };
        let order = match T::DIRECTION {
            Direction::Forward => self.cfg.reverse_postorder(),
            Direction::Backward => self.cfg.postorder(),
        };

        let mut is_start = vec![false; count];
        for start in &starts {
            is_start[start.index()] = true;
        }
        let mut visits = vec![0usize; count];
        let mut in_worklist = vec![false; count];
        let mut worklist = VecDeque::with_capacity(count);
        for block in starts.iter().chain(order.iter()) {
            if !in_worklist[block.index()] {
                in_worklist[block.index()] = true;
                worklist.push_back(*block);
            }
        }

        while let Some(block) = worklist.pop_front() {
            let b = block.index();
            in_worklist[b] = false;
            self.iterations += 1;

            let mut incoming = if is_start[b] {
                init.clone()
            } else {
                T::Domain::bottom()
            };
            self.join_incoming(self.cfg.block(block), &mut incoming);

            let previous = &self.entry_states[b];
            let entry = if visits[b] >= self.widening_threshold {
                previous.widen(&incoming)
            } else {
                previous.join(&incoming)
            };
            if entry.is_bottom() || (visits[b] > 0 && entry == *previous) {
                continue;
            }
            visits[b] += 1;

            let mut exit = entry.clone();
            self.transfer.analyze_node(self.cfg.block(block), &mut exit);
            self.entry_states[b] = entry;
            if exit == self.exit_states[b] {
                continue;
            }
            self.exit_states[b] = exit;

            for next in self.flows_into(self.cfg.block(block)) {
                if !in_worklist[next.index()] {
                    in_worklist[next.index()] = true;
                    worklist.push_back(next);
                }
            }
        }
        trace!(
            "fixpoint over {} blocks reached after {} visits",
            count,
            self.iterations
        );
    }

    /// Joins the transferred exit states of every edge flowing into `block`.
    fn join_incoming(&self, block: &Block, state: &mut T::Domain) {
        match T::DIRECTION {
            Direction::Forward => {
                for edge in block.preds() {
                    let source = self.cfg.block(edge.source);
                    let flowed = self.transfer.analyze_edge(
                        edge,
                        source,
                        &self.exit_states[edge.source.index()],
                    );
                    state.join_with(&flowed);
                }
            }
            Direction::Backward => {
                for edge in block.succs() {
                    let target = self.cfg.block(edge.target);
                    let flowed = self.transfer.analyze_edge(
                        edge,
                        target,
                        &self.exit_states[edge.target.index()],
                    );
                    state.join_with(&flowed);
                }
            }
        }
    }

    /// Blocks whose entry state depends on the exit state of `block`.
    fn flows_into(&self, block: &Block) -> Vec<BlockId> {
        match T::DIRECTION {
            Direction::Forward => block.succs().iter().map(|e| e.target).collect(),
            Direction::Backward => block.preds().iter().map(|e| e.source).collect(),
        }
    }

    /// State flowing into `block`, in analysis order.
    ///
    /// # Panics
    ///
    /// Panics if `block` is not a block of the analyzed graph.
    #[must_use]
    pub fn entry_state_at(&self, block: BlockId) -> &T::Domain {
        &self.entry_states[block.index()]
    }

    /// State flowing out of `block`, in analysis order.
    ///
    /// # Panics
    ///
    /// Panics if `block` is not a block of the analyzed graph.
    #[must_use]
    pub fn exit_state_at(&self, block: BlockId) -> &T::Domain {
        &self.exit_states[block.index()]
    }

    /// The analysis.
    #[must_use]
    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    /// The analyzed graph.
    #[must_use]
    pub fn cfg(&self) -> &'a ControlFlowGraph {
        self.cfg
    }

    /// Number of block visits performed by the last run.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Replays the transfer over `block`, calling `visit` with each
    /// instruction and the state just before it, in analysis order.
    ///
    /// Nothing is visited when the block is unreachable.
    pub fn replay(&self, block: BlockId, mut visit: impl FnMut(&Instruction, &T::Domain)) {
        let mut state = self.entry_states[block.index()].clone();
        if state.is_bottom() {
            return;
        }
        let insns = self.cfg.block(block).insns();
        let mut step = |insn: &Instruction, state: &mut T::Domain| {
            visit(insn, state);
            self.transfer.analyze_instruction(insn, state);
        };
        match T::DIRECTION {
            Direction::Forward => insns.iter().for_each(|insn| step(insn, &mut state)),
            Direction::Backward => insns.iter().rev().for_each(|insn| step(insn, &mut state)),
        }
    }
}
